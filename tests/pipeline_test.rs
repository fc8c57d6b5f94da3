//! End-to-end pipeline runs over small study data, from CSV and from xlsx
//!
//! Fifteen participants, three conditions. P13 and P14 are flagged unusable,
//! P12 has no rated video and the ratings include one video (`PX`) with no
//! participant, so the full record table holds twelve rows.

use calamine::{open_workbook_auto, Reader};
use rapport_analysis::manifest::{ArtifactKind, RunManifest, RunStatus};
use rapport_analysis::storage::load_table;
use rapport_analysis::table::TableExt;
use rapport_analysis::{Error, Pipeline};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};

const CONDITIONS: [&str; 3] = ["Task-only", "Fixed", "Adaptive"];

const TARGET_PLOTS: [&str; 5] = [
    "Learning_gain_total.png",
    "Learning_gain_conc.png",
    "Learning_gain_proc.png",
    "AMT_Rapport_Average.png",
    "self_report_Rapport_Average.png",
];

struct StudyFiles {
    ratings: PathBuf,
    learning: PathBuf,
    participants: PathBuf,
}

/// Header row followed by data rows, every cell as text
type Rows = Vec<Vec<String>>;

struct StudyRows {
    ratings: Rows,
    learning: Rows,
    participants: Rows,
}

fn header(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

/// Fifteen participants named by `id`, plus ratings for `orphan`
fn study_rows(id: impl Fn(usize) -> String, orphan: &str) -> StudyRows {
    let mut learning = vec![header(&[
        "Participant",
        "Pre_test",
        "Post_test",
        "Learning_gain_total",
        "Learning_gain_conc",
        "Learning_gain_proc",
        "Study_Condition",
    ])];
    let mut participants = vec![header(&[
        "Participant",
        "Student_Gender",
        "Age",
        "Grade",
        "School",
        "Algebra_experience",
        "Condition",
        "Usable",
        "self_report_Rapport_Average",
    ])];
    let mut ratings = vec![header(&["Video", "Slice", "Rating"])];

    for i in 0..15usize {
        let id = id(i);
        let condition = CONDITIONS[i % 3];
        let conc = (i * 3) % 7 + i % 3;
        let proc = (i * 5) % 4 + 1;
        let total = conc + proc;
        learning.push(vec![
            id.clone(),
            "10".to_string(),
            (10 + total).to_string(),
            total.to_string(),
            conc.to_string(),
            proc.to_string(),
            condition.to_string(),
        ]);

        let gender = if (i / 2) % 2 == 0 { "F" } else { "M" };
        let grade = 7 + (i / 3) % 2;
        let algebra = if i % 4 == 0 || i % 5 == 1 { "Yes" } else { "No" };
        let usable = if i == 13 || i == 14 { "N" } else { "Y" };
        #[allow(clippy::cast_precision_loss)]
        let self_report = 3.0 + (i % 4) as f64 * 0.5;
        participants.push(vec![
            id.clone(),
            gender.to_string(),
            (12 + grade - 7).to_string(),
            grade.to_string(),
            format!("School{}", i % 2),
            algebra.to_string(),
            condition.to_string(),
            usable.to_string(),
            format!("{self_report:.1}"),
        ]);

        if i != 12 {
            for slice in 0..3 + i % 3 {
                ratings.push(vec![
                    id.clone(),
                    slice.to_string(),
                    ((i + slice * 2) % 5 + 2).to_string(),
                ]);
            }
        }
    }
    for (slice, rating) in [(0, 5), (1, 6)] {
        ratings.push(vec![orphan.to_string(), slice.to_string(), rating.to_string()]);
    }

    StudyRows {
        ratings,
        learning,
        participants,
    }
}

fn write_csv(path: &Path, rows: &[Vec<String>]) {
    let text: String = rows.iter().map(|row| row.join(",") + "\n").collect();
    std::fs::write(path, text).unwrap();
}

/// Numeric-looking cells are written as numbers, everything else as text
fn write_xlsx(path: &Path, rows: &[Vec<String>]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        let r = u32::try_from(r).unwrap();
        for (c, cell) in row.iter().enumerate() {
            let c = u16::try_from(c).unwrap();
            match cell.parse::<f64>() {
                Ok(number) if r > 0 => sheet.write_number(r, c, number).unwrap(),
                _ => sheet.write_string(r, c, cell).unwrap(),
            };
        }
    }
    workbook.save(path).unwrap();
}

fn write_study(dir: &Path) -> StudyFiles {
    let rows = study_rows(|i| format!("P{i:02}"), "PX");
    let files = StudyFiles {
        ratings: dir.join("ratings.csv"),
        learning: dir.join("learning.csv"),
        participants: dir.join("participants.csv"),
    };
    write_csv(&files.ratings, &rows.ratings);
    write_csv(&files.learning, &rows.learning);
    write_csv(&files.participants, &rows.participants);
    files
}

/// Same study as workbooks, with numeric participant and video ids
fn write_study_xlsx(dir: &Path) -> StudyFiles {
    let rows = study_rows(|i| (100 + i).to_string(), "999");
    let files = StudyFiles {
        ratings: dir.join("ratings.xlsx"),
        learning: dir.join("learning.xlsx"),
        participants: dir.join("participants.xlsx"),
    };
    write_xlsx(&files.ratings, &rows.ratings);
    write_xlsx(&files.learning, &rows.learning);
    write_xlsx(&files.participants, &rows.participants);
    files
}

fn pipeline(files: &StudyFiles, output_dir: &Path) -> Pipeline {
    Pipeline::builder()
        .inputs(&files.ratings, &files.learning, &files.participants)
        .output_dir(output_dir)
        .quiet(true)
        .build()
        .unwrap()
}

#[test]
fn test_full_run_produces_tables_and_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_study(dir.path());
    let out = dir.path().join("out");

    let outcome = pipeline(&files, &out).run().unwrap();

    assert_eq!(outcome.tables.merged.num_rows(), 15);
    assert_eq!(outcome.tables.usable.num_rows(), 13);
    assert_eq!(outcome.tables.summary.num_rows(), 15);
    assert_eq!(outcome.tables.full.num_rows(), 12);

    for name in [
        "WoZ_2019_AMTRatings.xlsx",
        "WoZ_2019_FullData.xlsx",
        "WoZ_2019_FullData.parquet",
        "reportedvsAMTrapport.png",
        "analysis_report.json",
        "run_manifest.json",
    ]
    .iter()
    .chain(&TARGET_PLOTS)
    {
        assert!(out.join(name).is_file(), "missing artifact {name}");
    }
}

#[test]
fn test_usable_rows_only_reach_full_table() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_study(dir.path());
    let outcome = pipeline(&files, &dir.path().join("out")).run().unwrap();

    let usable = outcome.tables.full.text_values("Usable").unwrap();
    assert!(usable.iter().all(|v| v.as_deref() == Some("Y")));

    let ids = outcome.tables.full.text_values("Participant").unwrap();
    for absent in ["P12", "P13", "P14", "PX"] {
        assert!(!ids.contains(&Some(absent.to_string())), "{absent} in full table");
    }
    assert!(outcome.tables.full.column_position("Study_Condition").is_err());
}

#[test]
fn test_summary_pivot_width_and_mean() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_study(dir.path());
    let out = dir.path().join("out");
    pipeline(&files, &out).run().unwrap();

    let summary = load_table(out.join("WoZ_2019_AMTRatings.xlsx")).unwrap();
    let schema = summary.schema();
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Participant",
            "AMT_Slice_0",
            "AMT_Slice_1",
            "AMT_Slice_2",
            "AMT_Slice_3",
            "AMT_Slice_4",
            "AMT_Rapport_Average"
        ]
    );

    // P00: three slices 2, 4, 6
    let ids = summary.text_values("Participant").unwrap();
    let p00 = ids.iter().position(|v| v.as_deref() == Some("P00")).unwrap();
    let average = summary.numeric_values("AMT_Rapport_Average").unwrap();
    assert!((average[p00].unwrap() - 4.0).abs() < 1e-9);
    assert_eq!(summary.numeric_values("AMT_Slice_3").unwrap()[p00], None);
}

#[test]
fn test_full_workbook_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_study(dir.path());
    let out = dir.path().join("out");
    pipeline(&files, &out).run().unwrap();

    let workbook = open_workbook_auto(out.join("WoZ_2019_FullData.xlsx")).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["AllVideos", "UsableVideos"]);
}

#[test]
fn test_output_tables_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_study(dir.path());
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    pipeline(&files, &first).run().unwrap();
    pipeline(&files, &second).run().unwrap();

    for name in [
        "WoZ_2019_AMTRatings.xlsx",
        "WoZ_2019_FullData.xlsx",
        "WoZ_2019_FullData.parquet",
    ] {
        let a = std::fs::read(first.join(name)).unwrap();
        let b = std::fs::read(second.join(name)).unwrap();
        assert!(!a.is_empty(), "{name} is empty");
        assert!(a == b, "{name} bytes differ between runs");
    }
}

#[test]
fn test_xlsx_inputs_with_numeric_ids() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_study_xlsx(dir.path());
    let out = dir.path().join("out");

    let outcome = pipeline(&files, &out).run().unwrap();

    assert_eq!(outcome.tables.merged.num_rows(), 15);
    assert_eq!(outcome.tables.usable.num_rows(), 13);
    assert_eq!(outcome.tables.summary.num_rows(), 15);
    assert_eq!(outcome.tables.full.num_rows(), 12);

    let ids = outcome.tables.full.text_values("Participant").unwrap();
    assert_eq!(ids[0].as_deref(), Some("100"));
    for absent in ["112", "113", "114", "999"] {
        assert!(!ids.contains(&Some(absent.to_string())), "{absent} in full table");
    }

    let total = &outcome.report.columns[0];
    assert_eq!(total.anova.within.df, 9);
    assert_eq!(total.ols.n_obs, 12);
    assert_eq!(outcome.report.rapport_comparison.ttest.df, 22);

    let summary = load_table(out.join("WoZ_2019_AMTRatings.xlsx")).unwrap();
    let average = summary.numeric_values("AMT_Rapport_Average").unwrap();
    assert!((average[0].unwrap() - 4.0).abs() < 1e-9);
}

#[test]
fn test_report_and_manifest_contents() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_study(dir.path());
    let out = dir.path().join("out");
    let outcome = pipeline(&files, &out).run().unwrap();

    assert_eq!(outcome.report.columns.len(), 5);
    let total = &outcome.report.columns[0];
    assert_eq!(total.column, "Learning_gain_total");
    let groups: Vec<&str> = total.describe.iter().map(|d| d.group.as_str()).collect();
    assert_eq!(groups, CONDITIONS);
    assert_eq!(total.anova.between.df, 2);
    assert_eq!(total.anova.within.df, 9);
    assert_eq!(total.ols.n_obs, 12);
    assert!(total.ols_covariates.coefficient("Grade").is_some());
    assert!(total
        .ols_covariates
        .coefficient("Student_Gender[T.M]")
        .is_some());
    assert_eq!(outcome.report.rapport_comparison.ttest.df, 22);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("analysis_report.json")).unwrap())
            .unwrap();
    assert_eq!(json["columns"].as_array().unwrap().len(), 5);

    let manifest = RunManifest::read_json(&out.join("run_manifest.json")).unwrap();
    assert_eq!(manifest.status(), RunStatus::Success);
    assert_eq!(manifest.row_count("full"), Some(12));
    assert_eq!(manifest.row_count("ratings"), Some(59));
    let plots = manifest
        .artifacts()
        .iter()
        .filter(|a| a.kind() == ArtifactKind::Plot)
        .count();
    assert_eq!(plots, 6);
}

#[test]
fn test_missing_target_column_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_study(dir.path());
    let out = dir.path().join("out");

    let mut config = rapport_analysis::PipelineConfig::default();
    config.analysis.target_columns = vec!["Posttest_Score".to_string()];
    let pipeline = Pipeline::builder()
        .config(config)
        .inputs(&files.ratings, &files.learning, &files.participants)
        .output_dir(&out)
        .quiet(true)
        .build()
        .unwrap();

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, Error::ColumnNotFound { .. }));
    let manifest = RunManifest::read_json(&out.join("run_manifest.json")).unwrap();
    assert_eq!(manifest.status(), RunStatus::Failed);
}

#[test]
fn test_empty_condition_group_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_study(dir.path());

    let mut config = rapport_analysis::PipelineConfig::default();
    config.analysis.condition_order.push("Control".to_string());
    let out = dir.path().join("out");
    let pipeline = Pipeline::builder()
        .config(config)
        .inputs(&files.ratings, &files.learning, &files.participants)
        .output_dir(&out)
        .quiet(true)
        .build()
        .unwrap();

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, Error::Statistics(_)));
    assert!(err.to_string().contains("Control"));

    // every column is plotted before the first ANOVA runs
    for name in TARGET_PLOTS {
        assert!(out.join(name).is_file(), "missing plot {name}");
    }
}
