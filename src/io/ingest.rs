//! Measurement file ingest.
//!
//! This module turns the lab's file formats into domain types:
//!
//! - four-point-probe CSV exports → sheet-resistance readings
//! - sample description JSON → `SampleData`
//! - S4 grating fit output JSON → `MeasurementRecord`
//! - reflectometer `.fitnk` exports → `NkSpectrum`
//! - mobility sweep film lists → `SweepFilm`
//!
//! File-system and syntax problems are `AppError`s (exit code 2); a file that
//! parses but lacks what the analysis needs is a `DrudeError` so the batch
//! can skip it.

use std::fs::File;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{MeasurementRecord, NkSpectrum, SampleData};
use crate::error::{AppError, DrudeError};
use crate::quantities::SweepFilm;

/// S4 reports the extinction coefficient of the grating layer a decade low.
pub const S4_EXTINCTION_SCALE: f64 = 10.0;

/// Lines of instrument metadata before and after the `.fitnk` table.
const FITNK_HEADER_LINES: usize = 5;
const FITNK_FOOTER_LINES: usize = 6;

/// Sheet resistances (Ω/sq) from the first column of a probe CSV with a header row.
pub fn load_sheet_resistance(path: &Path) -> Result<Vec<f64>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::config(format!("Failed to open CSV '{}': {e}", path.display()))
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut readings = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based lines, plus the header.
        let line = idx + 2;
        let record = result.map_err(|e| {
            AppError::config(format!("CSV parse error in '{}' line {line}: {e}", path.display()))
        })?;
        let Some(first) = record.get(0).filter(|s| !s.is_empty()) else {
            continue;
        };
        let value: f64 = first.parse().map_err(|_| {
            AppError::config(format!(
                "'{}' line {line}: `{first}` is not a sheet resistance",
                path.display()
            ))
        })?;
        readings.push(value);
    }
    Ok(readings)
}

#[derive(Debug, Deserialize)]
struct FilmRow {
    #[serde(rename = "Sample")]
    name: String,
    #[serde(rename = "Sheet Resistance")]
    sheet_resistance: f64,
    #[serde(rename = "Film Thickness")]
    thickness_nm: f64,
}

/// Films for a mobility sweep: CSV with `Sample`, `Sheet Resistance` (Ω/sq)
/// and `Film Thickness` (nm) columns.
pub fn load_sweep_films(path: &Path) -> Result<Vec<SweepFilm>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::config(format!("Failed to open CSV '{}': {e}", path.display()))
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut films = Vec::new();
    for (idx, row) in reader.deserialize::<FilmRow>().enumerate() {
        let row = row.map_err(|e| {
            AppError::config(format!("CSV parse error in '{}' line {}: {e}", path.display(), idx + 2))
        })?;
        films.push(SweepFilm {
            name: row.name,
            sheet_resistance: row.sheet_resistance,
            thickness_nm: row.thickness_nm,
        });
    }
    Ok(films)
}

/// A sample description JSON file.
pub fn load_sample(path: &Path) -> Result<SampleData, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::config(format!("Failed to open sample '{}': {e}", path.display()))
    })?;
    let mut sample: SampleData = serde_json::from_reader(file).map_err(|e| {
        AppError::config(format!("Invalid sample JSON '{}': {e}", path.display()))
    })?;
    if sample.file_name.is_empty() {
        sample.file_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    Ok(sample)
}

/// Parse an S4 output file; see [`reduce_s4`] for the reduction.
pub fn load_s4_document(path: &Path) -> Result<Value, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::config(format!("Failed to open S4 output '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::config(format!("Invalid S4 JSON '{}': {e}", path.display())))
}

/// Reduce a parsed S4 output document.
///
/// Gratings carrying a `"<name> Missing Parameters"` entry are ignored. No
/// usable grating, or a top-level `"Skip"` flag, is a missing measurement.
pub fn reduce_s4(doc: &Value) -> Result<MeasurementRecord, DrudeError> {
    let root = doc
        .as_object()
        .ok_or_else(|| DrudeError::MissingMeasurement("S4 output is not a JSON object".to_string()))?;
    if root.contains_key("Skip") {
        return Err(DrudeError::MissingMeasurement("S4 output is flagged `Skip`".to_string()));
    }
    let gratings = root
        .get("Gratings")
        .and_then(Value::as_array)
        .ok_or_else(|| DrudeError::MissingMeasurement("S4 output lists no `Gratings`".to_string()))?;

    let mut record = MeasurementRecord::default();
    for grating in gratings {
        let Some(name) = grating.as_str() else {
            continue;
        };
        let Some(entry) = root.get(name).and_then(Value::as_object) else {
            return Err(DrudeError::MissingMeasurement(format!(
                "S4 output has no section for grating `{name}`"
            )));
        };
        if entry.contains_key(&format!("{name} Missing Parameters")) {
            continue;
        }
        let g = GratingReader { name, entry };

        let te_n = g.variable("TE", "material_n")?;
        let tm_n = g.variable("TM", "material_n")?;
        let (te_k, k_index) = g.variable_at("TE", "material_k")?;
        let k_error = g.number_at(&format!("{name}_TE Optimizer Errors"), k_index)?;
        let peak = g.fano("Peak")?;
        let te_t = g.variable("TE", "film_thickness")?;
        let tm_t = g.variable("TM", "film_thickness")?;
        let fom = g.number(&format!("{name}_TE Figure Of Merit"))?
            + g.number(&format!("{name}_TM Figure Of Merit"))?;

        let thickness = (te_t + tm_t) / 2.0;
        record.gratings.push(name.to_string());
        record.refractive_index.push(te_n);
        record.refractive_index_error.push((te_n - tm_n).abs().sqrt() / 2.0);
        record.extinction_coefficient.push(te_k * S4_EXTINCTION_SCALE);
        record.extinction_coefficient_error.push(k_error);
        record.peak_wavelength.push(peak.0);
        record.peak_wavelength_error.push(peak.1);
        record.film_thickness.push(thickness);
        record.film_thickness_error.push((thickness - tm_t).abs());
        record.figure_of_merit.push(fom);
    }

    if record.is_empty() {
        return Err(DrudeError::MissingMeasurement(
            "S4 output has no grating with a complete fit".to_string(),
        ));
    }
    Ok(record)
}

struct GratingReader<'a> {
    name: &'a str,
    entry: &'a Map<String, Value>,
}

impl GratingReader<'_> {
    fn missing(&self, what: &str) -> DrudeError {
        DrudeError::MissingMeasurement(format!("S4 grating `{}` lacks {what}", self.name))
    }

    fn number(&self, key: &str) -> Result<f64, DrudeError> {
        self.entry
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.missing(&format!("`{key}`")))
    }

    fn array(&self, key: &str) -> Result<&Vec<Value>, DrudeError> {
        self.entry
            .get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| self.missing(&format!("`{key}`")))
    }

    fn number_at(&self, key: &str, index: usize) -> Result<f64, DrudeError> {
        self.array(key)?
            .get(index)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.missing(&format!("entry {index} of `{key}`")))
    }

    fn position(&self, key: &str, label: &str) -> Result<usize, DrudeError> {
        self.array(key)?
            .iter()
            .position(|v| v.as_str() == Some(label))
            .ok_or_else(|| self.missing(&format!("`{label}` in `{key}`")))
    }

    /// Fitted S4 variable for one polarisation, with its index in the variable list.
    fn variable_at(&self, mode: &str, variable: &str) -> Result<(f64, usize), DrudeError> {
        let key = format!("{}_{mode} Variables", self.name);
        let vars = self
            .entry
            .get(&key)
            .and_then(Value::as_object)
            .ok_or_else(|| self.missing(&format!("`{key}`")))?;
        let sub = GratingReader {
            name: self.name,
            entry: vars,
        };
        let index = sub.position("S4 Strings", variable)?;
        Ok((sub.number_at("S4 Guesses", index)?, index))
    }

    fn variable(&self, mode: &str, variable: &str) -> Result<f64, DrudeError> {
        self.variable_at(mode, variable).map(|(v, _)| v)
    }

    /// TE Fano fit parameter and its error.
    fn fano(&self, parameter: &str) -> Result<(f64, f64), DrudeError> {
        let index = self.position(&format!("{}_TE Fano Fit Parameters", self.name), parameter)?;
        Ok((
            self.number_at(&format!("{}_TE Fano Fit", self.name), index)?,
            self.number_at(&format!("{}_TE Fano Errors", self.name), index)?,
        ))
    }
}

/// Load a `.fitnk` export.
pub fn load_fitnk(path: &Path) -> Result<NkSpectrum, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("Failed to read n/k file '{}': {e}", path.display()))
    })?;
    parse_fitnk(&text).map_err(|e| AppError::config(format!("'{}': {e}", path.display())))
}

/// Parse the `wavelength, n, k` table between the `.fitnk` header and footer.
pub fn parse_fitnk(text: &str) -> Result<NkSpectrum, String> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= FITNK_HEADER_LINES + FITNK_FOOTER_LINES {
        return Err(format!("only {} lines, no n/k table", lines.len()));
    }
    let body = &lines[FITNK_HEADER_LINES..lines.len() - FITNK_FOOTER_LINES];

    let mut spectrum = NkSpectrum::default();
    for (offset, line) in body.iter().enumerate() {
        let line_no = FITNK_HEADER_LINES + offset + 1;
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<f64> = line
            .split(',')
            .map(|c| c.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("line {line_no}: {e}"))?;
        let [wavelength, n, k, ..] = cols.as_slice() else {
            return Err(format!("line {line_no}: expected `wavelength, n, k`"));
        };
        spectrum.wavelength_nm.push(*wavelength);
        spectrum.n.push(*n);
        spectrum.k.push(*k);
    }
    if spectrum.wavelength_nm.is_empty() {
        return Err("n/k table is empty".to_string());
    }
    Ok(spectrum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn grating(name: &str, te_n: f64, tm_n: f64, te_t: f64, tm_t: f64) -> Value {
        let mut g = Map::new();
        g.insert(
            format!("{name}_TE Variables"),
            json!({
                "S4 Strings": ["film_thickness", "material_n", "material_k"],
                "S4 Guesses": [te_t, te_n, 0.02]
            }),
        );
        g.insert(
            format!("{name}_TM Variables"),
            json!({
                "S4 Strings": ["material_n", "film_thickness"],
                "S4 Guesses": [tm_n, tm_t]
            }),
        );
        g.insert(format!("{name}_TE Optimizer Errors"), json!([1.0, 0.01, 0.005]));
        g.insert(format!("{name}_TE Fano Fit Parameters"), json!(["Amplitude", "Peak", "Width"]));
        g.insert(format!("{name}_TE Fano Fit"), json!([0.8, 1250.0, 30.0]));
        g.insert(format!("{name}_TE Fano Errors"), json!([0.01, 2.5, 1.0]));
        g.insert(format!("{name}_TE Figure Of Merit"), json!(12.0));
        g.insert(format!("{name}_TM Figure Of Merit"), json!(8.0));
        Value::Object(g)
    }

    #[test]
    fn s4_reduces_usable_gratings() {
        let doc = json!({
            "Gratings": ["G1", "G2"],
            "G1": grating("G1", 1.80, 1.76, 150.0, 154.0),
            "G2": {"G2 Missing Parameters": ["material_n"]}
        });
        let r = reduce_s4(&doc).unwrap();
        assert_eq!(r.gratings, vec!["G1".to_string()]);
        assert_eq!(r.refractive_index, vec![1.80]);
        assert!((r.refractive_index_error[0] - 0.04f64.sqrt() / 2.0).abs() < 1e-12);
        assert!((r.extinction_coefficient[0] - 0.2).abs() < 1e-12);
        assert_eq!(r.extinction_coefficient_error, vec![0.005]);
        assert_eq!(r.peak_wavelength, vec![1250.0]);
        assert_eq!(r.peak_wavelength_error, vec![2.5]);
        assert_eq!(r.film_thickness, vec![152.0]);
        assert_eq!(r.film_thickness_error, vec![2.0]);
        assert_eq!(r.figure_of_merit, vec![20.0]);
    }

    #[test]
    fn s4_without_usable_gratings_is_missing() {
        let doc = json!({
            "Gratings": ["G1"],
            "G1": {"G1 Missing Parameters": []}
        });
        assert_eq!(reduce_s4(&doc).unwrap_err().kind(), "missing_measurement");
        assert!(reduce_s4(&json!({"Skip": true})).is_err());
    }

    #[test]
    fn s4_incomplete_grating_names_the_key() {
        let mut g = grating("G1", 1.8, 1.8, 150.0, 150.0);
        g.as_object_mut().unwrap().remove("G1_TE Fano Errors");
        let doc = json!({"Gratings": ["G1"], "G1": g});
        let err = reduce_s4(&doc).unwrap_err();
        assert!(err.to_string().contains("G1_TE Fano Errors"), "{err}");
    }

    #[test]
    fn sheet_resistance_reads_first_column() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "Sheet Resistance (Ohm/sq),Current (A)").unwrap();
        writeln!(f, "501.2, 0.001").unwrap();
        writeln!(f, "499.8, 0.001").unwrap();
        writeln!(f).unwrap();
        let r = load_sheet_resistance(f.path()).unwrap();
        assert_eq!(r, vec![501.2, 499.8]);
    }

    #[test]
    fn sheet_resistance_rejects_text() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "R,I").unwrap();
        writeln!(f, "n/a,0.001").unwrap();
        let err = load_sheet_resistance(f.path()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn sweep_films_by_column_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("films.csv");
        std::fs::write(
            &path,
            "Sample, Sheet Resistance, Film Thickness\nAF1, 677.65, 162.18\nAF2, 357.38, 147.13\n",
        )
        .unwrap();
        let films = load_sweep_films(&path).unwrap();
        assert_eq!(films.len(), 2);
        assert_eq!(films[1].name, "AF2");
        assert_eq!(films[0].thickness_nm, 162.18);
    }

    #[test]
    fn sample_name_defaults_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AF2.json");
        std::fs::write(&path, r#"{"Sheet Resistance": [1.0, 2.0]}"#).unwrap();
        let s = load_sample(&path).unwrap();
        assert_eq!(s.file_name, "AF2");
    }

    #[test]
    fn fitnk_skips_header_and_footer() {
        let mut text = String::new();
        for i in 0..5 {
            text.push_str(&format!("header {i}\n"));
        }
        text.push_str("400, 2.0, 0.01\n800, 1.8, 0.1\n");
        for i in 0..6 {
            text.push_str(&format!("footer {i}\n"));
        }
        let s = parse_fitnk(&text).unwrap();
        assert_eq!(s.wavelength_nm, vec![400.0, 800.0]);
        assert_eq!(s.k, vec![0.01, 0.1]);
    }

    #[test]
    fn fitnk_too_short_is_an_error() {
        assert!(parse_fitnk("a\nb\nc\n").is_err());
    }
}
