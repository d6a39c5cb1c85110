#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_flags_override_file_values() {
        let mut config = Config::from_toml("[storage]\nnamespace = \"from-file\"\nchunk_size = 10\n")
            .unwrap();
        let overrides = RunOverrides {
            namespace: Some("from-flag".to_string()),
            fetch_workers: Some(12),
            dry_run: true,
            targets: vec!["T1".to_string(), "T2".to_string(), "T1".to_string()],
            ..RunOverrides::default()
        };
        apply(&mut config, &overrides).unwrap();
        assert_eq!(config.storage.namespace, "from-flag");
        assert_eq!(config.storage.chunk_size, 10);
        assert_eq!(config.pipeline.fetch_workers, 12);
        assert!(config.storage.dry_run);
        assert_eq!(config.input.targets.unwrap().len(), 2);
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let mut config = Config::default();
        apply(&mut config, &RunOverrides::default()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_flag_value_rejected() {
        let mut config = Config::default();
        let overrides = RunOverrides {
            chunk_size: Some(0),
            ..RunOverrides::default()
        };
        assert!(apply(&mut config, &overrides).is_err());
    }

    #[test]
    fn test_load_explicit_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "scoring:\n  max_entries: 50\n").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.scoring.max_entries, 50);
        assert!(load(Some(&dir.path().join("missing.yaml"))).is_err());
    }
}
