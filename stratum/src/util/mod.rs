pub mod process;

pub use process::{is_process_alive, kill_process, parse_signal, read_pid_file, signal_process};
