use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Structured formats serialize `value`; `Human` defers to `human`.
    pub fn render<T, F>(self, value: &T, human: F) -> Result<String>
    where
        T: Serialize,
        F: FnOnce(&T) -> String,
    {
        Ok(match self {
            OutputFormat::Human => human(value),
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }

    pub fn emit<T, F>(self, value: &T, human: F) -> Result<()>
    where
        T: Serialize,
        F: FnOnce(&T) -> String,
    {
        let rendered = self.render(value, human)?;
        println!("{}", rendered.trim_end());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_formats_ignore_human_renderer() {
        let value = json!({"enabled": true});
        let rendered = OutputFormat::Json
            .render(&value, |_| "unused".into())
            .unwrap();
        assert!(rendered.contains("\"enabled\": true"));
        let rendered = OutputFormat::Yaml
            .render(&value, |_| "unused".into())
            .unwrap();
        assert_eq!(rendered.trim(), "enabled: true");
        let rendered = OutputFormat::Human
            .render(&value, |_| "Enabled: yes".into())
            .unwrap();
        assert_eq!(rendered, "Enabled: yes");
    }
}
