//! Translate an OCI image configuration blob into [`crate::model::ImageConfig`].

use crate::model::ImageConfig;
use oci_spec::image::ImageConfiguration;

pub fn image_config_from_oci(config: &ImageConfiguration) -> ImageConfig {
    let cfg = config.config().clone().unwrap_or_default();

    ImageConfig {
        entrypoint: cfg.entrypoint().clone().unwrap_or_default(),
        cmd: cfg.cmd().clone().unwrap_or_default(),
        env: cfg.env().clone().unwrap_or_default(),
        working_dir: cfg.working_dir().clone(),
        exposed_ports: cfg
            .exposed_ports()
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oci_spec::image::ConfigBuilder;

    #[test]
    fn extracts_entrypoint_cmd_and_env() {
        let inner = ConfigBuilder::default()
            .entrypoint(vec!["/bin/sh".to_string(), "-c".to_string()])
            .cmd(vec!["echo hi".to_string()])
            .env(vec!["PATH=/usr/bin".to_string()])
            .build()
            .unwrap();
        let config = ImageConfiguration::default();
        let config = {
            let mut builder = oci_spec::image::ImageConfigurationBuilder::default();
            builder = builder.config(inner);
            builder.architecture(config.architecture().clone()).os(config.os().clone()).build().unwrap()
        };

        let image_config = image_config_from_oci(&config);
        assert_eq!(image_config.entrypoint, vec!["/bin/sh", "-c"]);
        assert_eq!(image_config.cmd, vec!["echo hi"]);
        assert_eq!(image_config.env, vec!["PATH=/usr/bin"]);
    }
}
