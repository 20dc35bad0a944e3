//! Bulk enrollment from a directory of employee photos.
//!
//! Each image file is one employee. The file stem is the employee id and,
//! with underscores read as spaces, the employee's name: `ana_ruiz.jpg`
//! enrolls "Ana Ruiz" under id `ana_ruiz`.

use crate::common::Result;
use crate::core::enrollment::{Enrollment, EnrollmentError, EnrollmentPipeline};
use crate::core::validation::RegistrationForm;
use std::fs;
use std::path::{Path, PathBuf};

/// What happened to one file of a bulk run.
#[derive(Debug)]
pub struct FileEnrollment {
    pub path: PathBuf,
    pub external_id: String,
    pub outcome: std::result::Result<Enrollment, EnrollmentError>,
}

/// Enrolls every regular, non-hidden file in `dir` in file-name order.
///
/// A file that fails is logged and reported but never stops the run. Only a
/// directory that cannot be listed is an error.
pub fn enroll_directory(pipeline: &EnrollmentPipeline, dir: &Path, city: &str) -> Result<Vec<FileEnrollment>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(true, |name| name.starts_with('.'));
        if path.is_file() && !hidden {
            paths.push(path);
        }
    }
    paths.sort();

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let external_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!("Enrolling employee: {}", external_id);

        let outcome = match fs::read(&path) {
            Ok(image) => pipeline.enroll(&form_for(&external_id, image, city)),
            Err(e) => Err(EnrollmentError::Internal(format!("Failed to read {}: {}", path.display(), e))),
        };

        match &outcome {
            Ok(enrollment) => tracing::info!(
                "Enrolled {} with template key {}",
                external_id,
                enrollment.record.template_key
            ),
            Err(e) => tracing::warn!("Could not enroll {}: {}", external_id, e),
        }

        results.push(FileEnrollment { path, external_id, outcome });
    }

    Ok(results)
}

/// First word of the title-cased stem is the first name, the rest the last name.
fn form_for(external_id: &str, image: Vec<u8>, city: &str) -> RegistrationForm {
    let mut words = external_id.split('_').filter(|w| !w.is_empty()).map(title_case);
    let first_name = words.next().unwrap_or_default();
    let last_name = words.collect::<Vec<_>>().join(" ");

    RegistrationForm {
        image,
        first_name,
        last_name,
        external_id: external_id.to_string(),
        city: city.to_string(),
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
