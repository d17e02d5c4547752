use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};

/// Install the global `fmt` subscriber at the configured level.
///
/// Fails if a global subscriber is already set, which tests and embedding
/// applications may treat as harmless.
pub fn init_tracing(config: &NodeConfig) -> NodeResult<()> {
    let level = config.level()?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| NodeError::Config(format!("tracing: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_level_is_rejected_before_install() {
        let mut config = NodeConfig::for_blobber("b1");
        config.log_level = "chatty".into();
        assert!(matches!(init_tracing(&config), Err(NodeError::Config(_))));
    }

    #[test]
    fn second_install_fails() {
        let config = NodeConfig::for_blobber("b1");
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
