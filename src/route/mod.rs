use std::sync::Arc;

use crate::config::Config;
use crate::ingest::Ingestor;
use crate::session::{Negotiator, Registry};

pub mod whip;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub negotiator: Arc<Negotiator>,
    pub ingestor: Arc<Ingestor>,
    pub registry: Registry,
}
