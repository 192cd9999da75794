use std::io::Write;
use std::path::Path;

use fourlep_common::{FourLepError, Result};
use serde::{Deserialize, Serialize};

use crate::histogram::{HistogramPair, Variation};

/// One row per in-range mass bin, in the shape a stacked data/MC plot consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotRow {
    pub low: f64,
    pub high: f64,
    pub data: f64,
    pub data_err: f64,
    /// nominal yield per MC category, in dataset-axis order
    pub mc: Vec<f64>,
    pub mc_total: f64,
    /// sqrt of summed w2 over all categories (MC statistical uncertainty band)
    pub mc_stat_err: f64,
    /// totals for every non-nominal variation, in `Variation::ALL[1..]` order
    pub variations: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotTable {
    pub categories: Vec<String>,
    pub rows: Vec<PlotRow>,
}

pub fn plot_table(pair: &HistogramPair) -> Result<PlotTable> {
    let axis = &pair.data.axis;
    let edges = axis.edges();
    let categories = pair.mc.dataset.labels.clone();
    let per_cat = categories
        .iter()
        .map(|c| pair.mc.project(c, Variation::Nominal))
        .collect::<Result<Vec<_>>>()?;
    let data_var = pair.data.variances();
    let nominal = pair.mc.total(Variation::Nominal);
    let nominal_var = nominal.variances();
    let shifted: Vec<_> = Variation::ALL[1..].iter().map(|v| pair.mc.total(*v)).collect();
    let rows = (0..axis.bins)
        .map(|i| PlotRow {
            low: edges[i],
            high: edges[i + 1],
            data: pair.data.bin(i).sum_w,
            data_err: data_var[i].sqrt(),
            mc: per_cat.iter().map(|h| h.bin(i).sum_w).collect(),
            mc_total: nominal.bin(i).sum_w,
            mc_stat_err: nominal_var[i].sqrt(),
            variations: shifted.iter().map(|h| h.bin(i).sum_w).collect(),
        })
        .collect();
    Ok(PlotTable { categories, rows })
}

// --- headless summary output ---

pub fn print_summary(pair: &HistogramPair) {
    let data = &pair.data;
    println!("{:<20} {} bins [{}, {}) GeV", "Binning:", data.axis.bins, data.axis.low, data.axis.high);
    println!("{:<20} {:.0}", "Data events:", data.values().iter().sum::<f64>());
    println!("{:<20} {:.0} / {:.0}", "Data under/over:", data.underflow().sum_w, data.overflow().sum_w);
    for cat in &pair.mc.dataset.labels {
        if let Ok(h) = pair.mc.project(cat, Variation::Nominal) {
            println!("{:<20} {:.3}", format!("{cat}:"), h.values().iter().sum::<f64>());
        }
    }
    for v in Variation::ALL {
        println!("{:<20} {:.3}", format!("MC {v}:"), pair.mc.total(v).values().iter().sum::<f64>());
    }
}

// --- JSON export ---

pub fn export_json(output_path: &Path, pair: &HistogramPair) -> Result<()> {
    let doc = serde_json::json!({
        "histograms": pair,
        "plot": plot_table(pair)?,
    });
    let mut file = std::fs::File::create(output_path)?;
    serde_json::to_writer_pretty(&mut file, &doc).map_err(|e| FourLepError::Other(e.to_string()))?;
    Ok(())
}

// --- CSV export ---

fn csv_field(s: &str) -> String {
    // csv-escape: wrap in quotes if contains comma, quote, or newline
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn export_csv(output_path: &Path, pair: &HistogramPair) -> Result<()> {
    let table = plot_table(pair)?;
    let mut file = std::fs::File::create(output_path)?;
    let mut header = vec!["low".to_string(), "high".into(), "data".into(), "data_err".into()];
    header.extend(table.categories.iter().map(|c| csv_field(c)));
    header.extend(["mc_total".to_string(), "mc_stat_err".into()]);
    header.extend(Variation::ALL[1..].iter().map(|v| v.label().to_string()));
    writeln!(file, "{}", header.join(","))?;
    for row in &table.rows {
        let mut fields = vec![
            format!("{}", row.low),
            format!("{}", row.high),
            format!("{}", row.data),
            format!("{:.6}", row.data_err),
        ];
        fields.extend(row.mc.iter().map(|v| format!("{v:.6}")));
        fields.push(format!("{:.6}", row.mc_total));
        fields.push(format!("{:.6}", row.mc_stat_err));
        fields.extend(row.variations.iter().map(|v| format!("{v:.6}")));
        writeln!(file, "{}", fields.join(","))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourlep_common::AnalysisConfig;

    fn pair() -> HistogramPair {
        let cats = vec!["Background $Z,t\\bar{t}$".to_string(), "Signal".to_string()];
        let mut p = HistogramPair::empty(&AnalysisConfig::default(), &cats).unwrap();
        p.data.fill(126.0);
        p.data.fill(127.0);
        p.mc.fill(126.0, &cats[0], Variation::Nominal, 0.3).unwrap();
        p.mc.fill(126.0, &cats[1], Variation::Nominal, 0.4).unwrap();
        p.mc.fill(126.0, &cats[1], Variation::ScaleFactorUp, 0.44).unwrap();
        p
    }

    #[test]
    fn plot_table_stacks_categories() {
        let t = plot_table(&pair()).unwrap();
        assert_eq!(t.rows.len(), 34);
        let row = &t.rows[9];
        assert_eq!(row.low, 125.0);
        assert_eq!(row.data, 2.0);
        assert!((row.data_err - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(row.mc, vec![0.3, 0.4]);
        assert!((row.mc_total - 0.7).abs() < 1e-12);
        assert!((row.mc_stat_err - (0.09f64 + 0.16).sqrt()).abs() < 1e-12);
        assert!((row.variations[0] - 0.44).abs() < 1e-12);
    }

    #[test]
    fn csv_has_header_and_one_row_per_bin() {
        let tmp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        export_csv(tmp.path(), &pair()).unwrap();
        let text = std::fs::read_to_string(tmp.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 35);
        assert!(lines[0].starts_with("low,high,data,data_err,\"Background $Z,t\\bar{t}$\",Signal,mc_total"));
        assert!(lines[0].ends_with("m4lDOWN"));
        assert!(lines[10].starts_with("125,130,2,"));
    }

    #[test]
    fn json_contains_histograms_and_plot() {
        let tmp = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        export_json(tmp.path(), &pair()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(tmp.path()).unwrap()).unwrap();
        assert!(v["histograms"]["MC"]["bins"].is_array());
        assert_eq!(v["plot"]["rows"].as_array().unwrap().len(), 34);
        let back: HistogramPair = serde_json::from_value(v["histograms"].clone()).unwrap();
        assert_eq!(back.data, pair().data);
        assert_eq!(back.mc.dataset, pair().mc.dataset);
        assert!((back.mc.total(Variation::Nominal).bin(9).sum_w - 0.7).abs() < 1e-12);
    }
}
