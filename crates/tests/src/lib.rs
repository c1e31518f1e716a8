//! # Integration Tests
//!
//! 跨 crate 的端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - pull / push 完整链路：Generator -> DispatchCore -> Consumer -> SqliteStore
//! - 背压、重试、取消等失败路径

#[cfg(test)]
mod support;

#[cfg(test)]
mod failure_tests;
#[cfg(test)]
mod pull_tests;
#[cfg(test)]
mod push_tests;

#[cfg(test)]
mod contract_tests {
    use contracts::{SimulationBlueprint, MAX_BATCH_SIZE};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_default_blueprint_is_valid() {
        config_loader::ConfigLoader::validate(&SimulationBlueprint::default()).unwrap();
    }

    #[test]
    fn test_blueprint_survives_toml() {
        let mut bp = SimulationBlueprint::default();
        bp.consumer.batch_size = Some(MAX_BATCH_SIZE);
        let toml = config_loader::ConfigLoader::to_toml(&bp).unwrap();
        let back = config_loader::ConfigLoader::load_from_str(
            &toml,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(back.batch_size(), MAX_BATCH_SIZE);
        assert_eq!(back.modes, bp.modes);
    }
}
