use serde::{Deserialize, Serialize};

/// one reconstructed lepton; momenta and energy in MeV as stored in the ntuples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lepton {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
    pub charge: i32,
    pub type_id: i32, // 11 = electron, 13 = muon
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub leptons: Vec<Lepton>,
    pub mc_weight: f64,
    pub scale_factor: f64,
    pub scale_factor_up: f64,
    pub scale_factor_down: f64,
}

impl Event {
    /// event with unit weights and scale factors, as real data carries
    pub fn unweighted(leptons: Vec<Lepton>) -> Self {
        Self {
            leptons,
            mc_weight: 1.0,
            scale_factor: 1.0,
            scale_factor_up: 1.0,
            scale_factor_down: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub dataset_category: String,
    pub filename: String,
}

/// a chunk of events from one file of one data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub metadata: BatchMetadata,
    pub events: Vec<Event>,
}

impl EventBatch {
    pub fn new(dataset_category: impl Into<String>, filename: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            metadata: BatchMetadata {
                dataset_category: dataset_category.into(),
                filename: filename.into(),
            },
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
