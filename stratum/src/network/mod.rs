//! Network Manager (spec §4.6): bridge/veth/iptables for `bridge` mode,
//! passthrough for `host` mode, loopback-only for `none` mode.
//!
//! Shells out to `ip` and `iptables` the way the teacher's process-spawning
//! helpers (`util::process`) invoke external binaries, since neither
//! `nix` nor any workspace dependency offers a netlink or netfilter client.

use crate::error::{StratumError, StratumResult};
use crate::model::{NetworkMode, PortMapping};
use std::net::Ipv4Addr;
use std::process::Command;
use stratum_shared::constants::net_defaults;

pub struct NetworkManager {
    bridge_name: String,
    bridge_address: Ipv4Addr,
    bridge_prefix: u8,
}

impl Default for NetworkManager {
    fn default() -> Self {
        Self {
            bridge_name: net_defaults::BRIDGE_NAME.to_string(),
            bridge_address: net_defaults::BRIDGE_ADDRESS.parse().unwrap(),
            bridge_prefix: 16,
        }
    }
}

impl NetworkManager {
    pub fn new(bridge_name: String, bridge_cidr: &str) -> StratumResult<Self> {
        let (address, prefix) = parse_cidr(bridge_cidr)?;
        Ok(Self { bridge_name, bridge_address: address, bridge_prefix: prefix })
    }

    /// Set up networking for a container's network namespace, named by its
    /// pid (matches `/proc/<pid>/ns/net`, what `ip netns` operates on once
    /// bind-mounted into `/var/run/netns`).
    pub fn setup(&self, container_id: &str, pid: u32, mode: NetworkMode, ports: &[PortMapping]) -> StratumResult<Option<Ipv4Addr>> {
        match mode {
            NetworkMode::Host => Ok(None),
            NetworkMode::None => {
                self.bind_netns(pid)?;
                run(Command::new("ip").args(["netns", "exec", &netns_name(pid), "ip", "link", "set", "lo", "up"]))?;
                self.unbind_netns(pid)?;
                Ok(None)
            }
            NetworkMode::Bridge => {
                self.ensure_bridge()?;
                let address = self.container_address(container_id)?;
                self.create_veth(container_id, pid, address)?;
                self.install_port_forwards(container_id, address, ports)?;
                Ok(Some(address))
            }
        }
    }

    /// Reverse of [`setup`]: teardown removes exactly what setup added,
    /// keyed by `container_id` (spec §4.6).
    pub fn teardown(&self, container_id: &str, mode: NetworkMode) -> StratumResult<()> {
        if mode != NetworkMode::Bridge {
            return Ok(());
        }
        let host_veth = host_veth_name(container_id);
        let _ = run(Command::new("ip").args(["link", "delete", &host_veth]));
        run(Command::new("iptables").args(["-t", "nat", "-D", "POSTROUTING", "-s", &format!("{}/{}", self.bridge_address, self.bridge_prefix), "-j", "MASQUERADE"]))
            .ok();
        self.delete_port_forwards(container_id)
    }

    fn ensure_bridge(&self) -> StratumResult<()> {
        let exists = Command::new("ip").args(["link", "show", &self.bridge_name]).output().map(|o| o.status.success()).unwrap_or(false);
        if !exists {
            run(Command::new("ip").args(["link", "add", "name", &self.bridge_name, "type", "bridge"]))?;
            run(Command::new("ip").args(["addr", "add", &format!("{}/{}", self.bridge_address, self.bridge_prefix), "dev", &self.bridge_name]))?;
            run(Command::new("ip").args(["link", "set", &self.bridge_name, "up"]))?;
            run(Command::new("iptables").args(["-t", "nat", "-A", "POSTROUTING", "-s", &format!("{}/{}", self.bridge_address, self.bridge_prefix), "-j", "MASQUERADE"]))?;
        }
        Ok(())
    }

    fn create_veth(&self, container_id: &str, pid: u32, address: Ipv4Addr) -> StratumResult<()> {
        let host_veth = host_veth_name(container_id);
        run(Command::new("ip").args(["link", "add", &host_veth, "type", "veth", "peer", "name", "eth0", "netns", &pid.to_string()]))?;
        run(Command::new("ip").args(["link", "set", &host_veth, "master", &self.bridge_name]))?;
        run(Command::new("ip").args(["link", "set", &host_veth, "up"]))?;

        run(Command::new("nsenter").args(["-t", &pid.to_string(), "-n", "ip", "link", "set", "eth0", "up"]))?;
        run(Command::new("nsenter").args(["-t", &pid.to_string(), "-n", "ip", "addr", "add", &format!("{}/{}", address, self.bridge_prefix), "dev", "eth0"]))?;
        run(Command::new("nsenter").args(["-t", &pid.to_string(), "-n", "ip", "route", "add", "default", "via", &self.bridge_address.to_string()]))?;
        run(Command::new("nsenter").args(["-t", &pid.to_string(), "-n", "ip", "link", "set", "lo", "up"]))?;
        Ok(())
    }

    fn install_port_forwards(&self, container_id: &str, address: Ipv4Addr, ports: &[PortMapping]) -> StratumResult<()> {
        for port in ports {
            run(Command::new("iptables").args([
                "-t", "nat", "-A", "PREROUTING",
                "-p", port.protocol.as_str(),
                "--dport", &port.host_port.to_string(),
                "-m", "comment", "--comment", &format!("stratum:{container_id}"),
                "-j", "DNAT", "--to-destination", &format!("{}:{}", address, port.container_port),
            ]))?;
        }
        Ok(())
    }

    fn delete_port_forwards(&self, container_id: &str) -> StratumResult<()> {
        let comment = format!("stratum:{container_id}");
        loop {
            let output = Command::new("iptables").args(["-t", "nat", "-L", "PREROUTING", "-n", "--line-numbers"]).output();
            let Ok(output) = output else { break };
            let stdout = String::from_utf8_lossy(&output.stdout);
            let Some(line_no) = stdout.lines().find(|l| l.contains(&comment)).and_then(|l| l.split_whitespace().next()) else {
                break;
            };
            run(Command::new("iptables").args(["-t", "nat", "-D", "PREROUTING", line_no]))?;
        }
        Ok(())
    }

    fn container_address(&self, container_id: &str) -> StratumResult<Ipv4Addr> {
        let octets = self.bridge_address.octets();
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        container_id.hash(&mut hasher);
        let offset = (hasher.finish() % 250) as u8 + 2;
        Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], offset))
    }

    fn bind_netns(&self, pid: u32) -> StratumResult<()> {
        std::fs::create_dir_all("/var/run/netns").map_err(|e| StratumError::io("network.netns", "failed to create /var/run/netns").with_source(e))?;
        let target = format!("/var/run/netns/{}", netns_name(pid));
        std::fs::File::create(&target).map_err(|e| StratumError::io("network.netns", format!("failed to create {target}")).with_source(e))?;
        run(Command::new("mount").args(["--bind", &format!("/proc/{}/ns/net", pid), &target]))
    }

    fn unbind_netns(&self, pid: u32) -> StratumResult<()> {
        let target = format!("/var/run/netns/{}", netns_name(pid));
        let _ = Command::new("umount").arg(&target).status();
        let _ = std::fs::remove_file(&target);
        Ok(())
    }
}

fn host_veth_name(container_id: &str) -> String {
    format!("veth{}", &container_id[..8.min(container_id.len())])
}

fn netns_name(pid: u32) -> String {
    format!("stratum-{pid}")
}

fn parse_cidr(cidr: &str) -> StratumResult<(Ipv4Addr, u8)> {
    let (addr, prefix) = cidr.split_once('/').ok_or_else(|| StratumError::validation("network.config", format!("'{cidr}' is not a valid CIDR")))?;
    let address: Ipv4Addr = addr.parse().map_err(|e| StratumError::validation("network.config", format!("invalid address in '{cidr}'")).with_source(e))?;
    let prefix: u8 = prefix.parse().map_err(|e| StratumError::validation("network.config", format!("invalid prefix in '{cidr}'")).with_source(e))?;
    Ok((address, prefix))
}

fn run(command: &mut Command) -> StratumResult<()> {
    let output = command.output().map_err(|e| StratumError::system("network.exec", format!("failed to run {:?}", command)).with_source(e))?;
    if !output.status.success() {
        return Err(StratumError::system(
            "network.exec",
            format!("{:?} failed: {}", command, String::from_utf8_lossy(&output.stderr)),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bridge_cidr() {
        let (addr, prefix) = parse_cidr("10.88.0.0/16").unwrap();
        assert_eq!(addr, Ipv4Addr::new(10, 88, 0, 0));
        assert_eq!(prefix, 16);
    }

    #[test]
    fn rejects_malformed_cidr() {
        assert!(parse_cidr("not-a-cidr").is_err());
    }

    #[test]
    fn host_veth_name_is_short_and_stable() {
        let id = "a".repeat(64);
        assert_eq!(host_veth_name(&id), format!("veth{}", "a".repeat(8)));
    }
}
