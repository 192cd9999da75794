use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Int32Type, Int64Type};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use memmap2::Mmap;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;
use fourlep_common::{FourLepError, Result, DATA_CATEGORY};

use crate::event::{Event, EventBatch, Lepton};
use crate::selection::{
    LeptonQuery, COL_LEP_CHARGE, COL_LEP_E, COL_LEP_ETA, COL_LEP_N, COL_LEP_PHI, COL_LEP_PT,
    COL_LEP_TYPE, COL_MC_WEIGHT, COL_SF, COL_SF_DOWN, COL_SF_UP, LEPTON_COLUMNS,
    SCALE_FACTOR_COMPONENTS,
};

/// read a whole local file into memory through a memory map
pub fn read_local_bytes(path: &Path) -> Result<Bytes> {
    let file = std::fs::File::open(path)?;
    let mmap: Mmap = unsafe { Mmap::map(&file)? };
    Ok(Bytes::copy_from_slice(&mmap))
}

/// unified async fetch: dispatches to S3, GCS, or local reader based on URI prefix
pub async fn fetch_file_bytes(path: &str, s3_endpoint: Option<&str>) -> Result<Bytes> {
    if crate::s3_reader::is_s3_uri(path) {
        crate::s3_reader::fetch_s3_bytes(path, s3_endpoint).await
    } else if crate::gcs_reader::is_gcs_uri(path) {
        crate::gcs_reader::fetch_gcs_bytes(path).await
    } else {
        read_local_bytes(Path::new(path))
    }
}

/// Simulated files must carry `mcWeight` and either a precomputed `scaleFactor`
/// or every scale-factor component. Data files may omit all of them.
fn check_weight_columns(has: impl Fn(&str) -> bool, simulated: bool, filename: &str) -> Result<()> {
    if !simulated {
        return Ok(());
    }
    if !has(COL_MC_WEIGHT) {
        return Err(FourLepError::MissingColumn(format!("{COL_MC_WEIGHT} in {filename}")));
    }
    if has(COL_SF) {
        return Ok(());
    }
    match SCALE_FACTOR_COMPONENTS.into_iter().find(|&c| !has(c)) {
        Some(c) => Err(FourLepError::MissingColumn(format!("{c} (and no {COL_SF}) in {filename}"))),
        None => Ok(()),
    }
}

/// Iterator of event batches from one Parquet file, with the query's
/// lepton-count filter and derived scale factors applied.
pub struct EventBatchReader {
    inner: ParquetRecordBatchReader,
    query: LeptonQuery,
    simulated: bool,
    category: String,
    filename: String,
}

impl EventBatchReader {
    pub fn try_new(
        bytes: Bytes,
        query: &LeptonQuery,
        batch_size: usize,
        category: &str,
        filename: &str,
    ) -> Result<Self> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(bytes).map_err(FourLepError::Parquet)?;
        let schema = builder.schema().clone();
        let indices: Vec<usize> = query
            .columns()
            .iter()
            .filter_map(|c| schema.fields().iter().position(|f| f.name() == c))
            .collect();
        for col in LEPTON_COLUMNS {
            if schema.field_with_name(col).is_err() {
                return Err(FourLepError::MissingColumn(format!("{col} in {filename}")));
            }
        }
        let simulated = category != DATA_CATEGORY;
        check_weight_columns(|c| schema.field_with_name(c).is_ok(), simulated, filename)?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
        let inner = builder
            .with_projection(mask)
            .with_batch_size(batch_size)
            .build()
            .map_err(FourLepError::Parquet)?;
        Ok(Self {
            inner,
            query: query.clone(),
            simulated,
            category: category.to_owned(),
            filename: filename.to_owned(),
        })
    }
}

impl Iterator for EventBatchReader {
    type Item = Result<EventBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let rb = match self.inner.next()? {
            Ok(rb) => rb,
            Err(e) => return Some(Err(FourLepError::Arrow(e))),
        };
        Some(
            decode_events(&rb, &self.query, self.simulated)
                .map(|events| EventBatch::new(&self.category, &self.filename, events)),
        )
    }
}

fn list_column(rb: &RecordBatch, name: &str, inner: DataType) -> Result<ArrayRef> {
    let col = rb
        .column_by_name(name)
        .ok_or_else(|| FourLepError::MissingColumn(name.to_owned()))?;
    let target = DataType::List(Arc::new(Field::new("item", inner, true)));
    Ok(cast(col, &target)?)
}

fn f64_column(rb: &RecordBatch, name: &str) -> Result<Option<Float64Array>> {
    match rb.column_by_name(name) {
        None => Ok(None),
        Some(col) => Ok(Some(cast(col, &DataType::Float64)?.as_primitive::<Float64Type>().clone())),
    }
}

fn i64_column(rb: &RecordBatch, name: &str) -> Result<Option<Int64Array>> {
    match rb.column_by_name(name) {
        None => Ok(None),
        Some(col) => Ok(Some(cast(col, &DataType::Int64)?.as_primitive::<Int64Type>().clone())),
    }
}

fn value_or(col: Option<&Float64Array>, row: usize, default: f64) -> f64 {
    match col {
        Some(a) if !a.is_null(row) => a.value(row),
        _ => default,
    }
}

/// Decode one record batch into typed events.
///
/// Events whose lepton count (`lep_n`, or the list length when `lep_n` is absent)
/// fails the query are dropped. On data (`simulated == false`) missing weight
/// columns default to 1.0; simulated batches without them are rejected.
pub fn decode_events(rb: &RecordBatch, query: &LeptonQuery, simulated: bool) -> Result<Vec<Event>> {
    check_weight_columns(|c| rb.column_by_name(c).is_some(), simulated, "record batch")?;
    let pt = list_column(rb, COL_LEP_PT, DataType::Float64)?;
    let eta = list_column(rb, COL_LEP_ETA, DataType::Float64)?;
    let phi = list_column(rb, COL_LEP_PHI, DataType::Float64)?;
    let energy = list_column(rb, COL_LEP_E, DataType::Float64)?;
    let charge = list_column(rb, COL_LEP_CHARGE, DataType::Int32)?;
    let type_id = list_column(rb, COL_LEP_TYPE, DataType::Int32)?;

    let (pt, eta, phi, energy) = (pt.as_list::<i32>(), eta.as_list::<i32>(), phi.as_list::<i32>(), energy.as_list::<i32>());
    let (charge, type_id) = (charge.as_list::<i32>(), type_id.as_list::<i32>());
    let pt_v = pt.values().as_primitive::<Float64Type>();
    let eta_v = eta.values().as_primitive::<Float64Type>();
    let phi_v = phi.values().as_primitive::<Float64Type>();
    let e_v = energy.values().as_primitive::<Float64Type>();
    let q_v = charge.values().as_primitive::<Int32Type>();
    let t_v = type_id.values().as_primitive::<Int32Type>();

    let lep_n = i64_column(rb, COL_LEP_N)?;
    let mc_weight = f64_column(rb, COL_MC_WEIGHT)?;
    let sf = f64_column(rb, COL_SF)?;
    let sf_up = f64_column(rb, COL_SF_UP)?;
    let sf_down = f64_column(rb, COL_SF_DOWN)?;
    let components: Vec<Float64Array> = SCALE_FACTOR_COMPONENTS
        .iter()
        .map(|c| f64_column(rb, c))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();

    let mut events = Vec::with_capacity(rb.num_rows());
    for row in 0..rb.num_rows() {
        let lo = pt.value_offsets()[row] as usize;
        let hi = pt.value_offsets()[row + 1] as usize;
        let count = match &lep_n {
            Some(n) if !n.is_null(row) => n.value(row),
            _ => (hi - lo) as i64,
        };
        if count != (hi - lo) as i64 {
            return Err(FourLepError::Other(format!(
                "row {row}: {COL_LEP_N} = {count} but {} leptons stored",
                hi - lo
            )));
        }
        let count = hi - lo;
        if !query.accepts(count) {
            continue;
        }
        for list in [eta, phi, energy, charge, type_id] {
            if list.value_length(row) as usize != hi - lo {
                return Err(FourLepError::Other(format!(
                    "row {row}: lepton columns disagree on lepton count"
                )));
            }
        }
        let leptons: Vec<Lepton> = (0..hi - lo)
            .map(|k| Lepton {
                pt: pt_v.value(lo + k),
                eta: eta_v.value(eta.value_offsets()[row] as usize + k),
                phi: phi_v.value(phi.value_offsets()[row] as usize + k),
                energy: e_v.value(energy.value_offsets()[row] as usize + k),
                charge: q_v.value(charge.value_offsets()[row] as usize + k),
                type_id: t_v.value(type_id.value_offsets()[row] as usize + k),
            })
            .collect();

        let (scale_factor, scale_factor_up, scale_factor_down) = match &sf {
            Some(nominal) if !nominal.is_null(row) => {
                let n = nominal.value(row);
                (
                    n,
                    value_or(sf_up.as_ref(), row, n * query.up_factor),
                    value_or(sf_down.as_ref(), row, n * query.down_factor),
                )
            }
            _ => {
                let parts: Vec<f64> = components.iter().map(|c| value_or(Some(c), row, 1.0)).collect();
                query.scale_factors(&parts)
            }
        };
        events.push(Event {
            leptons,
            mc_weight: value_or(mc_weight.as_ref(), row, 1.0),
            scale_factor,
            scale_factor_up,
            scale_factor_down,
        });
    }
    Ok(events)
}

/// open and fully decode a local file; convenience for small inputs and tests
pub fn read_event_file(
    path: &Path,
    query: &LeptonQuery,
    batch_size: usize,
    category: &str,
) -> Result<Vec<EventBatch>> {
    let bytes = read_local_bytes(path)?;
    let name = path.to_string_lossy();
    EventBatchReader::try_new(bytes, query, batch_size, category, &name)?.collect()
}
