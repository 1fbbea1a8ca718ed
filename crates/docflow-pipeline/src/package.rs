//! Output packaging
//!
//! Multi-document results without merge go out as one zip archive with a
//! PDF entry per input, named after the client's original file.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::base_name;
use crate::error::PipelineError;

/// Used when a client file name has no usable stem
const FALLBACK_STEM: &str = "document";

/// Original file name with its extension swapped for `.pdf`
pub fn archive_entry_name(original: &str) -> String {
    let base = base_name(original);
    let stem = match base.rfind('.') {
        Some(0) | None => base,
        Some(i) => &base[..i],
    };
    let stem = stem.trim();
    if stem.is_empty() || stem == "." || stem == ".." {
        format!("{}.pdf", FALLBACK_STEM)
    } else {
        format!("{}.pdf", stem)
    }
}

/// Entry names for `originals`, in order, with repeats disambiguated as
/// `name (2).pdf`, `name (3).pdf`, ...
pub fn unique_entry_names<'a, I>(originals: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken = HashSet::new();
    let mut names = Vec::new();

    for original in originals {
        let name = archive_entry_name(original);
        let unique = if taken.contains(&name) {
            let stem = name.strip_suffix(".pdf").unwrap_or(&name);
            (2..)
                .map(|n| format!("{} ({}).pdf", stem, n))
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_else(|| name.clone())
        } else {
            name
        };
        taken.insert(unique.clone());
        names.push(unique);
    }

    names
}

/// Write a deflated zip at `path` containing each `(entry name, file)` pair
pub fn write_archive(path: &Path, entries: &[(String, PathBuf)]) -> Result<(), PipelineError> {
    let file = std::fs::File::create(path).map_err(|e| {
        PipelineError::Packaging(format!("cannot create {}: {}", path.display(), e))
    })?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, source) in entries {
        let bytes = std::fs::read(source).map_err(|e| {
            PipelineError::Packaging(format!("cannot read {}: {}", source.display(), e))
        })?;
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&bytes)
            .map_err(|e| PipelineError::Packaging(format!("cannot write {}: {}", name, e)))?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_entry_name_swaps_extension() {
        assert_eq!(archive_entry_name("report.docx"), "report.pdf");
        assert_eq!(archive_entry_name("old.memo.doc"), "old.memo.pdf");
        assert_eq!(archive_entry_name("C:\\docs\\letter.DOC"), "letter.pdf");
    }

    #[test]
    fn test_entry_name_falls_back_for_empty_stems() {
        assert_eq!(archive_entry_name(".docx"), ".docx.pdf");
        assert_eq!(archive_entry_name("   .doc"), "document.pdf");
        assert_eq!(archive_entry_name("../"), "document.pdf");
    }

    #[test]
    fn test_duplicate_names_are_disambiguated() {
        let names = unique_entry_names(["a.docx", "a.doc", "b.docx", "a.docx"]);
        assert_eq!(names, vec!["a.pdf", "a (2).pdf", "b.pdf", "a (3).pdf"]);
    }

    #[test]
    fn test_disambiguation_skips_names_already_used() {
        let names = unique_entry_names(["a (2).docx", "a.docx", "a.docx"]);
        assert_eq!(names, vec!["a (2).pdf", "a.pdf", "a (3).pdf"]);
    }

    #[test]
    fn test_write_archive_contains_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("1.pdf");
        let two = dir.path().join("2.pdf");
        std::fs::write(&one, b"%PDF-one").unwrap();
        std::fs::write(&two, b"%PDF-two").unwrap();
        let archive = dir.path().join("out.zip");

        write_archive(
            &archive,
            &[("first.pdf".into(), one), ("second.pdf".into(), two)],
        )
        .unwrap();

        let mut zip = zip::ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
        assert_eq!(zip.by_index(0).unwrap().name(), "first.pdf");
        assert_eq!(zip.by_index(1).unwrap().name(), "second.pdf");
    }

    #[test]
    fn test_write_archive_fails_on_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_archive(
            &dir.path().join("out.zip"),
            &[("gone.pdf".into(), dir.path().join("missing.pdf"))],
        );
        assert!(matches!(result, Err(PipelineError::Packaging(_))));
    }

    proptest! {
        /// N inputs always give N distinct entry names ending in .pdf
        #[test]
        fn entry_names_are_distinct(stems in prop::collection::vec("[a-c]{1,2}", 1..12)) {
            let originals: Vec<String> = stems.iter().map(|s| format!("{}.docx", s)).collect();
            let names = unique_entry_names(originals.iter().map(String::as_str));

            prop_assert_eq!(names.len(), originals.len());
            let distinct: HashSet<_> = names.iter().collect();
            prop_assert_eq!(distinct.len(), names.len());
            prop_assert!(names.iter().all(|n| n.ends_with(".pdf")));
        }
    }
}
