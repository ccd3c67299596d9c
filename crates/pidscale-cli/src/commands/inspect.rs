//! `pidscale info` and `pidscale key`.

use pidscale_strategy::{CheckStrategy, PidStrategy, PolicyKey, ScalingCheck, Strategy};

/// Print plugin metadata as JSON.
pub fn info() -> anyhow::Result<()> {
    let info = PidStrategy::new().plugin_info();
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Print the policy key derived for a check.
pub fn key(source: &str, query: &str, group: &str, name: &str, strategy: &str) -> anyhow::Result<()> {
    println!("{}", derive_key(source, query, group, name, strategy));
    Ok(())
}

fn derive_key(source: &str, query: &str, group: &str, name: &str, strategy: &str) -> PolicyKey {
    PolicyKey::derive(&ScalingCheck {
        source: source.to_string(),
        query: query.to_string(),
        group: group.to_string(),
        name: name.to_string(),
        strategy: CheckStrategy {
            name: strategy.to_string(),
            config: Default::default(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_matches_library_derivation() {
        let key = derive_key("gitlab-ci", "", "runners", "pending", "pid");
        assert_eq!(key.as_str(), "gitlab-ci/14695981039346656037/runners/pending/pid");
    }
}
