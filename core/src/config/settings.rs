use super::EnvDefaults;
use crate::Result;
use ::config::{Config, Environment, Map};

impl EnvDefaults {
    /// Load `KAFKACLI_*` variables from the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load from an explicit set of variables instead of the process
    /// environment. Names keep their `KAFKACLI_` prefix.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Some(vars))
    }

    fn load(vars: Option<Map<String, String>>) -> Result<Self> {
        let settings = Config::builder()
            .add_source(Environment::with_prefix("KAFKACLI").source(vars))
            .build()?;

        Ok(settings.try_deserialize::<EnvDefaults>()?)
    }
}
