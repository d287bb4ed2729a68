use crate::error::{CliError, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Creates `path` as an empty output directory.
///
/// An existing directory is an error unless `force` is set, in which case it
/// is removed with everything inside it first.
pub fn prepare_output_dir(path: &Path, force: bool) -> Result<()> {
    if path.exists() {
        if !force {
            return Err(CliError::OutputExists {
                path: path.to_path_buf(),
            });
        }
        warn!("Removing existing output directory {:?}", path);
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
    }
    fs::create_dir_all(path)?;
    info!("Prepared output directory {:?}", path);
    Ok(())
}

/// Refuses any input that lives inside `output_dir`, where replacing the
/// directory would delete it. Inputs are `(role, path)` pairs; the role
/// names the input in the error.
pub fn ensure_outside_output(output_dir: &Path, inputs: &[(&str, &Path)]) -> Result<()> {
    match inputs.iter().find(|(_, path)| is_within(path, output_dir)) {
        Some((role, path)) => Err(CliError::Argument(format!(
            "{} {} lies inside the output directory {}",
            role,
            path.display(),
            output_dir.display()
        ))),
        None => Ok(()),
    }
}

fn is_within(path: &Path, dir: &Path) -> bool {
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => path.starts_with(dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_directory_is_created() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        prepare_output_dir(&out, false).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn existing_directory_is_refused_without_force() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(out.join("keep.txt"), "data").unwrap();

        let result = prepare_output_dir(&out, false);
        assert!(matches!(result, Err(CliError::OutputExists { .. })));
        assert!(out.join("keep.txt").exists());
    }

    #[test]
    fn force_replaces_existing_directory() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("sampled_pdb")).unwrap();
        fs::write(out.join("sampled_pdb").join("generated_0.pdb"), "END\n").unwrap();

        prepare_output_dir(&out, true).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn inputs_inside_the_output_directory_are_named_in_the_error() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("samples")).unwrap();
        let outside = dir.path().join("input.pdb");
        fs::write(&outside, "END\n").unwrap();

        ensure_outside_output(&out, &[("Structure", outside.as_path())]).unwrap();

        let samples = out.join("samples");
        let err = ensure_outside_output(
            &out,
            &[("Structure", outside.as_path()), ("Sample directory", samples.as_path())],
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Argument(ref msg) if msg.starts_with("Sample directory")));

        let dotted = dir.path().join("out").join("..").join("out").join("samples");
        assert!(ensure_outside_output(&out, &[("Sample directory", dotted.as_path())]).is_err());
        assert!(ensure_outside_output(&out, &[("Output itself", out.as_path())]).is_err());
    }
}
