pub mod channels;
pub mod health;
pub mod probe_configs;
pub mod probe_types;
pub mod push;
pub mod results;
pub mod watchers;
