pub mod driver;
pub mod event;
pub mod executor;
pub mod export;
pub mod gcs_reader;
pub mod histogram;
pub mod inventory;
pub mod kinematics;
pub mod processor;
pub mod reader;
pub mod s3_reader;
pub mod scanner;
pub mod selection;
pub mod weights;

pub use fourlep_common::{FourLepError, Result, DATA_CATEGORY};
pub use driver::{last_result, run_all};
pub use event::{BatchMetadata, Event, EventBatch, Lepton};
pub use executor::{Executor, LocalExecutor, ResultStream};
pub use export::{export_csv, export_json, plot_table, print_summary, PlotRow, PlotTable};
pub use histogram::{CategoryAxis, Hist1D, Hist3D, HistogramPair, RegularAxis, Variation, WeightedSum};
pub use inventory::{read_inventory_parallel, FileInventory, Inventory};
pub use kinematics::{invariant_mass_gev, FourVector};
pub use processor::{sample_from_filename, HzzAnalysis, Processor};
pub use reader::{decode_events, fetch_file_bytes, read_event_file, EventBatchReader};
pub use scanner::{build_sources, resolve_paths, sources_from_config, DataSource};
pub use selection::{lepton_filter, select_mask, LeptonQuery};
pub use weights::{SampleInfo, WeightTable};
