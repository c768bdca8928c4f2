//! JSON content loading: grade catalog, caster configuration, cooling
//! configuration. Load failures are fatal at start-up.

use std::path::Path;

use anyhow::{Context, Result};
use cast_core::{
    CastContent, ChemistryElement, CoolingConfig, CoolingSectionDef, EngineConfig, GradeCatalog,
    GradeId, NozzleDef, SteelGrade,
};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GradeFileEntry {
    #[serde(rename = "SteelGradeId")]
    id: String,
    #[serde(rename = "SteelGradeGroup", default)]
    group: String,
    #[serde(rename = "LiquidusTemperatureC")]
    liquidus_c: f64,
    #[serde(rename = "TargetSuperheatC")]
    target_superheat_c: f64,
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "Chemistry", default)]
    chemistry: Vec<ChemistryFileEntry>,
}

#[derive(Deserialize)]
struct ChemistryFileEntry {
    #[serde(rename = "ElementName")]
    element: String,
    #[serde(rename = "Percentage")]
    percentage: f64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CasterConfigurationFile {
    #[serde(rename = "TundishWeightFluctuationTolerance")]
    tundish_weight_fluctuation_tolerance: Option<f64>,
    #[serde(rename = "TundishWeightCorrectionFactor")]
    tundish_weight_correction_factor: Option<f64>,
    #[serde(rename = "MaxTundishWeight")]
    max_tundish_weight_kg: Option<f64>,
    #[serde(rename = "RampUpThreshold")]
    ramp_up_threshold_kg: Option<f64>,
    #[serde(rename = "LowPouringRate")]
    low_pouring_rate_kg_s: Option<f64>,
    #[serde(rename = "HighPouringRate")]
    high_pouring_rate_kg_s: Option<f64>,
    #[serde(rename = "SteadyStateRate")]
    steady_state_rate_kg_s: Option<f64>,
    #[serde(rename = "TorchLocation")]
    torch_location_m: Option<f64>,
    #[serde(rename = "SteelDensity")]
    steel_density_kg_m3: Option<f64>,
    #[serde(rename = "TargetCastSpeed")]
    target_cast_speed_m_min: Option<f64>,
    #[serde(rename = "SpeedRampDuration")]
    speed_ramp_duration_s: Option<u32>,
    #[serde(rename = "TurretRotationDuration")]
    turret_rotation_duration_s: Option<u32>,
}

#[derive(Deserialize)]
struct CoolingFile {
    #[serde(rename = "BaseFlowLps")]
    base_flow_lps: f64,
    #[serde(rename = "FlowPerSpeedLps")]
    flow_per_speed_lps: f64,
    #[serde(rename = "Sections", default)]
    sections: Vec<CoolingSectionFile>,
}

#[derive(Deserialize)]
struct CoolingSectionFile {
    #[serde(rename = "Id")]
    id: u32,
    #[serde(rename = "PositionFactor")]
    position_factor: f64,
    #[serde(rename = "StartPosition")]
    start_position_m: f64,
    #[serde(rename = "EndPosition")]
    end_position_m: f64,
    #[serde(rename = "Nozzles", default)]
    nozzles: Vec<NozzleFile>,
}

#[derive(Deserialize)]
struct NozzleFile {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Position")]
    position_m: f64,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load catalog and configuration from `dir`:
/// `grades.json`, `caster.json`, `cooling.json`.
pub fn load_content(dir: &str) -> Result<CastContent> {
    let dir = Path::new(dir);
    let grades = load_grades(&dir.join("grades.json"))?;
    let config = load_caster_config(&dir.join("caster.json"))?;
    let cooling = load_cooling(&dir.join("cooling.json"))?;
    let content = CastContent {
        config,
        cooling,
        catalog: GradeCatalog::new(grades),
    };
    validate_content(&content);
    Ok(content)
}

fn load_grades(path: &Path) -> Result<Vec<SteelGrade>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading grade catalog: {}", path.display()))?;
    let entries: Vec<GradeFileEntry> = serde_json::from_str(&json)
        .with_context(|| format!("parsing grade catalog: {}", path.display()))?;
    Ok(entries
        .into_iter()
        .map(|e| SteelGrade {
            id: GradeId(e.id),
            group: e.group,
            liquidus_c: e.liquidus_c,
            target_superheat_c: e.target_superheat_c,
            description: e.description,
            chemistry: e
                .chemistry
                .into_iter()
                .map(|c| ChemistryElement {
                    element: c.element,
                    percentage: c.percentage,
                })
                .collect(),
        })
        .collect())
}

fn load_caster_config(path: &Path) -> Result<EngineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading caster configuration: {}", path.display()))?;
    let file: CasterConfigurationFile = serde_json::from_str(&json)
        .with_context(|| format!("parsing caster configuration: {}", path.display()))?;

    let defaults = EngineConfig::default();
    Ok(EngineConfig {
        tundish_weight_fluctuation_tolerance: file
            .tundish_weight_fluctuation_tolerance
            .unwrap_or(defaults.tundish_weight_fluctuation_tolerance),
        tundish_weight_correction_factor: file
            .tundish_weight_correction_factor
            .unwrap_or(defaults.tundish_weight_correction_factor),
        max_tundish_weight_kg: file
            .max_tundish_weight_kg
            .unwrap_or(defaults.max_tundish_weight_kg),
        ramp_up_threshold_kg: file
            .ramp_up_threshold_kg
            .unwrap_or(defaults.ramp_up_threshold_kg),
        low_pouring_rate_kg_s: file
            .low_pouring_rate_kg_s
            .unwrap_or(defaults.low_pouring_rate_kg_s),
        high_pouring_rate_kg_s: file
            .high_pouring_rate_kg_s
            .unwrap_or(defaults.high_pouring_rate_kg_s),
        steady_state_rate_kg_s: file
            .steady_state_rate_kg_s
            .unwrap_or(defaults.steady_state_rate_kg_s),
        torch_location_m: file.torch_location_m.unwrap_or(defaults.torch_location_m),
        steel_density_kg_m3: file
            .steel_density_kg_m3
            .unwrap_or(defaults.steel_density_kg_m3),
        target_cast_speed_m_min: file
            .target_cast_speed_m_min
            .unwrap_or(defaults.target_cast_speed_m_min),
        speed_ramp_duration_s: file
            .speed_ramp_duration_s
            .unwrap_or(defaults.speed_ramp_duration_s),
        turret_rotation_duration_s: file
            .turret_rotation_duration_s
            .unwrap_or(defaults.turret_rotation_duration_s),
        ..defaults
    })
}

fn load_cooling(path: &Path) -> Result<CoolingConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading cooling configuration: {}", path.display()))?;
    let file: CoolingFile = serde_json::from_str(&json)
        .with_context(|| format!("parsing cooling configuration: {}", path.display()))?;
    Ok(CoolingConfig {
        base_flow_lps: file.base_flow_lps,
        flow_per_speed_lps: file.flow_per_speed_lps,
        sections: file
            .sections
            .into_iter()
            .map(|s| CoolingSectionDef {
                id: s.id,
                position_factor: s.position_factor,
                start_position_m: s.start_position_m,
                end_position_m: s.end_position_m,
                nozzles: s
                    .nozzles
                    .into_iter()
                    .map(|n| NozzleDef {
                        kind: n.kind,
                        position_m: n.position_m,
                    })
                    .collect(),
            })
            .collect(),
    })
}

/// Validates loaded content, panicking on any authoring error.
///
/// Catches mistakes like an empty catalog, a grade without a plausible
/// liquidus, a cooling section with inverted bounds, or two cooling
/// sections covering the same stretch of strand. (Heat grade references
/// are checked where heats meet the catalog: at machine assembly and on
/// the schedule-replacing REST writes.)
pub fn validate_content(content: &CastContent) {
    assert!(
        !content.catalog.is_empty(),
        "grade catalog must contain at least one grade"
    );
    for grade in &content.catalog.grades {
        assert!(
            grade.liquidus_c > 1000.0 && grade.liquidus_c < 1700.0,
            "grade '{}' liquidus {} °C is not a steel liquidus",
            grade.id,
            grade.liquidus_c
        );
        assert!(
            grade.target_superheat_c > 0.0,
            "grade '{}' target superheat must be positive",
            grade.id
        );
    }

    let config = &content.config;
    assert!(
        config.torch_location_m > 0.0,
        "torch location must be positive"
    );
    assert!(
        config.steel_density_kg_m3 > 0.0,
        "steel density must be positive"
    );

    for section in &content.cooling.sections {
        assert!(
            section.start_position_m < section.end_position_m,
            "cooling section {} has inverted bounds [{}, {}]",
            section.id,
            section.start_position_m,
            section.end_position_m
        );
        assert!(
            section.position_factor > 0.0,
            "cooling section {} position factor must be positive",
            section.id
        );
    }

    // Sections may share a boundary but never a stretch of strand.
    let mut sections: Vec<&CoolingSectionDef> = content.cooling.sections.iter().collect();
    sections.sort_by(|a, b| a.start_position_m.total_cmp(&b.start_position_m));
    for pair in sections.windows(2) {
        assert!(
            pair[0].end_position_m <= pair[1].start_position_m,
            "cooling sections {} and {} overlap: [{}, {}] and [{}, {}]",
            pair[0].id,
            pair[1].id,
            pair[0].start_position_m,
            pair[0].end_position_m,
            pair[1].start_position_m,
            pair[1].end_position_m
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRADES_JSON: &str = r#"[
        {
            "SteelGradeId": "304",
            "SteelGradeGroup": "stainless",
            "LiquidusTemperatureC": 1450.0,
            "TargetSuperheatC": 25.0,
            "Description": "18/8 austenitic stainless",
            "Chemistry": [
                {"ElementName": "Cr", "Percentage": 18.0},
                {"ElementName": "Ni", "Percentage": 8.0}
            ]
        },
        {
            "SteelGradeId": "42CrMo4",
            "SteelGradeGroup": "alloyed",
            "LiquidusTemperatureC": 1495.0,
            "TargetSuperheatC": 28.0
        }
    ]"#;

    const CASTER_JSON: &str = r#"{
        "TorchLocation": 10.0,
        "SteelDensity": 7850.0,
        "TargetCastSpeed": 3.0,
        "SpeedRampDuration": 45,
        "MaxTundishWeight": 28000.0
    }"#;

    const COOLING_JSON: &str = r#"{
        "BaseFlowLps": 2.0,
        "FlowPerSpeedLps": 1.5,
        "Sections": [
            {
                "Id": 1,
                "PositionFactor": 1.0,
                "StartPosition": 0.0,
                "EndPosition": 2.0,
                "Nozzles": [{"Type": "cone", "Position": 0.5}]
            }
        ]
    }"#;

    fn write_content_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("grades.json"), GRADES_JSON).unwrap();
        std::fs::write(dir.path().join("caster.json"), CASTER_JSON).unwrap();
        std::fs::write(dir.path().join("cooling.json"), COOLING_JSON).unwrap();
        dir
    }

    #[test]
    fn loads_a_complete_content_dir() {
        let dir = write_content_dir();
        let content = load_content(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(content.catalog.grades.len(), 2);
        let grade = content.catalog.get(&GradeId("304".to_string())).unwrap();
        assert!((grade.liquidus_c - 1450.0).abs() < 1e-9);
        assert_eq!(grade.chemistry.len(), 2);

        // Explicit values land, omitted ones fall back to defaults.
        assert!((content.config.torch_location_m - 10.0).abs() < 1e-9);
        assert_eq!(content.config.speed_ramp_duration_s, 45);
        assert!((content.config.max_tundish_weight_kg - 28_000.0).abs() < 1e-9);
        let defaults = EngineConfig::default();
        assert!(
            (content.config.mold_level_target_mm - defaults.mold_level_target_mm).abs() < 1e-9
        );

        assert_eq!(content.cooling.sections.len(), 1);
        assert_eq!(content.cooling.sections[0].nozzles[0].kind, "cone");
    }

    #[test]
    fn missing_file_is_a_fatal_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_content(dir.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn malformed_json_is_a_fatal_error() {
        let dir = write_content_dir();
        std::fs::write(dir.path().join("grades.json"), "{not json").unwrap();
        assert!(load_content(dir.path().to_str().unwrap()).is_err());
    }

    #[test]
    #[should_panic(expected = "overlap")]
    fn overlapping_cooling_sections_panic_validation() {
        let dir = write_content_dir();
        std::fs::write(
            dir.path().join("cooling.json"),
            r#"{"BaseFlowLps": 2.0, "FlowPerSpeedLps": 1.5, "Sections": [
                {"Id": 1, "PositionFactor": 1.0, "StartPosition": 0.0, "EndPosition": 3.0},
                {"Id": 2, "PositionFactor": 0.9, "StartPosition": 2.0, "EndPosition": 5.0}
            ]}"#,
        )
        .unwrap();
        let _ = load_content(dir.path().to_str().unwrap());
    }

    #[test]
    fn touching_cooling_sections_are_accepted() {
        let dir = write_content_dir();
        std::fs::write(
            dir.path().join("cooling.json"),
            r#"{"BaseFlowLps": 2.0, "FlowPerSpeedLps": 1.5, "Sections": [
                {"Id": 2, "PositionFactor": 0.9, "StartPosition": 2.0, "EndPosition": 5.0},
                {"Id": 1, "PositionFactor": 1.0, "StartPosition": 0.0, "EndPosition": 2.0}
            ]}"#,
        )
        .unwrap();
        let content = load_content(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(content.cooling.sections.len(), 2);
    }

    #[test]
    #[should_panic(expected = "inverted bounds")]
    fn inverted_cooling_section_panics_validation() {
        let dir = write_content_dir();
        std::fs::write(
            dir.path().join("cooling.json"),
            r#"{"BaseFlowLps": 2.0, "FlowPerSpeedLps": 1.5, "Sections": [
                {"Id": 1, "PositionFactor": 1.0, "StartPosition": 5.0, "EndPosition": 2.0}
            ]}"#,
        )
        .unwrap();
        let _ = load_content(dir.path().to_str().unwrap());
    }
}
