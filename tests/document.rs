use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use docpack::{
    DocumentArchiver, Error, ZipWriter, create_document, document_files, extract_document,
    list_document, rewrite_archive, scan_references,
};
use flate2::Compression;

const STAMP: (u16, u16) = (0x6000, 0x5871);

fn temp_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temp dir")
}

fn write(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Every regular file below `root`, keyed by its "/"-joined relative path.
fn collect_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path.strip_prefix(root).unwrap();
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.insert(name, fs::read(&path).unwrap());
            }
        }
    }

    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn entry_names(archive: &Path) -> Vec<String> {
    list_document(archive)
        .unwrap()
        .into_iter()
        .map(|e| e.file_name)
        .collect()
}

/// A document with a GUI manifest and references in nested directories.
fn sample_document(root: &Path) -> PathBuf {
    let manifest = root.join("Document.xml");
    write(
        &manifest,
        br#"<?xml version="1.0" encoding="utf-8"?>
<Document SchemaVersion="4">
    <Properties Count="1">
        <Property name="Shape"><Part file="PartShape.brp"/></Property>
    </Properties>
    <ObjectData>
        <Object name="Box"><Mesh file="sub/data.bin"/></Object>
        <Object name="Deep"><Mesh file="sub/deeper/c.txt"/></Object>
    </ObjectData>
</Document>
"#,
    );
    write(
        &root.join("GuiDocument.xml"),
        br#"<Document><ViewProvider name="Box"><Color file="gui/DiffuseColor"/></ViewProvider></Document>"#,
    );
    write(&root.join("PartShape.brp"), b"DBRep_DrawableShape\n");
    write(&root.join("sub/data.bin"), &[0u8, 1, 2, 3, 254, 255]);
    write(&root.join("sub/deeper/c.txt"), b"nested");
    write(&root.join("gui/DiffuseColor"), &[0xCC; 256]);
    manifest
}

#[test]
fn create_then_extract_reproduces_the_document() {
    let source = temp_dir("docpack-src-");
    let manifest = sample_document(source.path());
    // Not referenced by either manifest
    write(&source.path().join("stray.txt"), b"left behind");

    let work = temp_dir("docpack-out-");
    let archive = work.path().join("Part.FCStd");
    create_document(&manifest, &archive).unwrap();

    let restored = work.path().join("restored");
    fs::create_dir(&restored).unwrap();
    extract_document(&archive, &restored).unwrap();

    let mut expected = collect_tree(source.path());
    expected.remove("stray.txt");
    assert_eq!(collect_tree(&restored), expected);
}

#[test]
fn archive_lists_manifests_before_their_references() {
    let source = temp_dir("docpack-src-");
    let manifest = sample_document(source.path());
    let archive = source.path().join("out.zip");

    create_document(&manifest, &archive).unwrap();
    assert_eq!(
        entry_names(&archive),
        [
            "Document.xml",
            "PartShape.brp",
            "sub/data.bin",
            "sub/deeper/c.txt",
            "GuiDocument.xml",
            "gui/DiffuseColor",
        ]
    );
}

#[test]
fn subdirectory_references_are_not_flattened() {
    let source = temp_dir("docpack-src-");
    let manifest = source.path().join("Document.xml");
    write(&manifest, br#"<Document><Mesh file="sub/data.bin"/></Document>"#);
    write(&source.path().join("sub/data.bin"), b"payload");

    let archive = source.path().join("out.zip");
    create_document(&manifest, &archive).unwrap();

    let names = entry_names(&archive);
    assert!(names.contains(&"sub/data.bin".to_string()));
    assert!(!names.contains(&"data.bin".to_string()));
}

#[test]
fn extraction_creates_shared_directory_prefixes_once() {
    let work = temp_dir("docpack-nested-");
    let archive = work.path().join("nested.zip");

    let mut writer = ZipWriter::create(&archive, Compression::default()).unwrap();
    writer.write_deflated("a/b/x.txt", b"x", STAMP).unwrap();
    writer.write_deflated("a/b/y.txt", b"y", STAMP).unwrap();
    writer.write_stored("a/c/z.txt", b"z", STAMP).unwrap();
    writer.finish().unwrap();

    let out = work.path().join("out");
    fs::create_dir(&out).unwrap();
    extract_document(&archive, &out).unwrap();
    // A second run over the existing tree must not trip over the directories
    extract_document(&archive, &out).unwrap();

    assert_eq!(fs::read(out.join("a/b/x.txt")).unwrap(), b"x");
    assert_eq!(fs::read(out.join("a/b/y.txt")).unwrap(), b"y");
    assert_eq!(fs::read(out.join("a/c/z.txt")).unwrap(), b"z");
}

#[test]
fn directory_entries_become_directories() {
    let work = temp_dir("docpack-dirs-");
    let archive = work.path().join("dirs.zip");

    let mut writer = ZipWriter::create(&archive, Compression::default()).unwrap();
    writer.add_directory("empty", STAMP).unwrap();
    writer.add_directory("a/b/", STAMP).unwrap();
    writer.write_deflated("a/b/file.txt", b"contents", STAMP).unwrap();
    writer.finish().unwrap();

    let out = work.path().join("out");
    fs::create_dir(&out).unwrap();
    extract_document(&archive, &out).unwrap();

    assert!(out.join("empty").is_dir());
    assert_eq!(fs::read(out.join("a/b/file.txt")).unwrap(), b"contents");
}

#[test]
fn scan_follows_document_order_on_disk() {
    let dir = temp_dir("docpack-scan-");
    let manifest = dir.path().join("Document.xml");
    write(
        &manifest,
        br#"<Doc><Prop file="x.bin"/><Prop name="y"/><Sub file="z.bin"><Inner file="w.bin"/></Sub></Doc>"#,
    );

    let refs = scan_references(&manifest).unwrap();
    assert_eq!(
        refs,
        [
            dir.path().join("x.bin"),
            dir.path().join("z.bin"),
            dir.path().join("w.bin"),
        ]
    );
}

#[test]
fn missing_referenced_files_are_skipped() {
    let source = temp_dir("docpack-lenient-");
    let manifest = source.path().join("Document.xml");
    write(
        &manifest,
        br#"<Document><A file="present.bin"/><B file="gone.bin"/><C file="sub"/></Document>"#,
    );
    write(&source.path().join("present.bin"), b"here");
    // A directory is not a regular file
    fs::create_dir(source.path().join("sub")).unwrap();

    let archive = source.path().join("out.zip");
    create_document(&manifest, &archive).unwrap();
    assert_eq!(entry_names(&archive), ["Document.xml", "present.bin"]);
}

#[test]
fn references_outside_the_document_are_skipped() {
    let root = temp_dir("docpack-outside-");
    let doc_dir = root.path().join("doc");
    let manifest = doc_dir.join("Document.xml");
    write(
        &manifest,
        br#"<Document><A file="../secret.txt"/><B file="inside.txt"/></Document>"#,
    );
    write(&root.path().join("secret.txt"), b"secret");
    write(&doc_dir.join("inside.txt"), b"inside");

    let archive = root.path().join("out.zip");
    create_document(&manifest, &archive).unwrap();
    assert_eq!(entry_names(&archive), ["Document.xml", "inside.txt"]);
}

#[test]
fn references_that_detour_back_into_the_document_are_kept() {
    let root = temp_dir("docpack-detour-");
    let doc_dir = root.path().join("doc");
    let manifest = doc_dir.join("Document.xml");
    write(
        &manifest,
        br#"<Document><A file="../doc/a.bin"/><B file="sub/../b.bin"/></Document>"#,
    );
    write(&doc_dir.join("a.bin"), b"a");
    write(&doc_dir.join("b.bin"), b"b");

    let archive = root.path().join("out.zip");
    create_document(&manifest, &archive).unwrap();
    assert_eq!(entry_names(&archive), ["Document.xml", "a.bin", "b.bin"]);
}

#[test]
fn creation_refuses_to_overwrite_a_document_file() {
    let dir = temp_dir("docpack-create-self-");
    let manifest = dir.path().join("Document.xml");
    write(&manifest, br#"<Doc><A file="a.bin"/></Doc>"#);
    write(&dir.path().join("a.bin"), b"payload");

    let err = create_document(&manifest, &dir.path().join("a.bin")).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(fs::read(dir.path().join("a.bin")).unwrap(), b"payload");

    let err = create_document(&manifest, &manifest).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(
        fs::read(&manifest).unwrap(),
        br#"<Doc><A file="a.bin"/></Doc>"#
    );
}

#[test]
fn duplicate_references_are_stored_once() {
    let source = temp_dir("docpack-dup-");
    let manifest = source.path().join("Document.xml");
    write(
        &manifest,
        br#"<Document><A file="shared.bin"/><B file="shared.bin"/></Document>"#,
    );
    write(&source.path().join("shared.bin"), b"shared");

    let files = document_files(&manifest).unwrap();
    assert_eq!(files.len(), 3);

    let archive = source.path().join("out.zip");
    create_document(&manifest, &archive).unwrap();
    assert_eq!(entry_names(&archive), ["Document.xml", "shared.bin"]);
}

#[test]
fn malformed_manifest_fails_without_writing_an_archive() {
    let source = temp_dir("docpack-strict-");
    let manifest = source.path().join("Document.xml");
    write(&manifest, br#"<Document><Part file="a.bin"/>"#);
    write(&source.path().join("a.bin"), b"a");

    assert!(matches!(
        scan_references(&manifest),
        Err(Error::Parse { .. })
    ));

    let archive = source.path().join("out.zip");
    let err = create_document(&manifest, &archive).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
    assert!(!archive.exists());
}

#[test]
fn malformed_gui_manifest_also_fails() {
    let source = temp_dir("docpack-strict-gui-");
    let manifest = source.path().join("Document.xml");
    write(&manifest, br#"<Document/>"#);
    write(&source.path().join("GuiDocument.xml"), b"<Document><Open>");

    let archive = source.path().join("out.zip");
    let err = create_document(&manifest, &archive).unwrap_err();
    assert!(matches!(err, Error::Parse { ref path, .. } if path.ends_with("GuiDocument.xml")));
    assert!(!archive.exists());
}

#[test]
fn gui_manifest_is_included_only_when_present() {
    let source = temp_dir("docpack-gui-");
    let manifest = sample_document(source.path());

    let with_gui = source.path().join("with.zip");
    create_document(&manifest, &with_gui).unwrap();
    let names = entry_names(&with_gui);
    assert!(names.contains(&"GuiDocument.xml".to_string()));
    assert!(names.contains(&"gui/DiffuseColor".to_string()));

    fs::remove_file(source.path().join("GuiDocument.xml")).unwrap();
    let without_gui = source.path().join("without.zip");
    create_document(&manifest, &without_gui).unwrap();
    let names = entry_names(&without_gui);
    assert!(!names.contains(&"GuiDocument.xml".to_string()));
    assert!(!names.contains(&"gui/DiffuseColor".to_string()));
}

#[test]
fn missing_inputs_are_not_found() {
    let dir = temp_dir("docpack-missing-");

    let archive = dir.path().join("out.zip");
    let err = create_document(&dir.path().join("Document.xml"), &archive).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(!archive.exists());

    let err = extract_document(&dir.path().join("nope.zip"), dir.path()).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn garbage_archive_is_corrupt() {
    let dir = temp_dir("docpack-corrupt-");
    let archive = dir.path().join("broken.FCStd");
    write(&archive, b"this is not a zip archive at all, just some bytes");

    let err = extract_document(&archive, dir.path()).unwrap_err();
    match err {
        Error::CorruptArchive(reason) => assert!(reason.contains("broken.FCStd")),
        other => panic!("expected a corrupt archive error, got {:?}", other),
    }
}

#[test]
fn entries_escaping_the_output_directory_are_rejected() {
    let dir = temp_dir("docpack-slip-");
    let archive = dir.path().join("evil.zip");

    let mut writer = ZipWriter::create(&archive, Compression::default()).unwrap();
    writer.write_deflated("../evil.txt", b"evil", STAMP).unwrap();
    writer.finish().unwrap();

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let err = extract_document(&archive, &out).unwrap_err();
    assert!(matches!(err, Error::UnsafeEntryPath(ref name) if name == "../evil.txt"));
    assert!(!dir.path().join("evil.txt").exists());
}

#[test]
fn rewrite_keeps_names_and_payloads() {
    let source = temp_dir("docpack-rewrite-");
    let manifest = sample_document(source.path());

    let original = source.path().join("original.zip");
    DocumentArchiver::with_compression_level(0)
        .create(&manifest, &original)
        .unwrap();

    let rewritten = source.path().join("rewritten.zip");
    let copied = rewrite_archive(&original, &rewritten).unwrap();
    assert_eq!(copied, 6);
    assert_eq!(entry_names(&rewritten), entry_names(&original));

    let a = source.path().join("a");
    let b = source.path().join("b");
    fs::create_dir(&a).unwrap();
    fs::create_dir(&b).unwrap();
    extract_document(&original, &a).unwrap();
    extract_document(&rewritten, &b).unwrap();
    assert_eq!(collect_tree(&a), collect_tree(&b));

    let dates: Vec<_> = list_document(&original)
        .unwrap()
        .iter()
        .map(|e| (e.last_mod_time, e.last_mod_date))
        .collect();
    let rewritten_dates: Vec<_> = list_document(&rewritten)
        .unwrap()
        .iter()
        .map(|e| (e.last_mod_time, e.last_mod_date))
        .collect();
    assert_eq!(dates, rewritten_dates);
}

#[test]
fn rewrite_refuses_to_overwrite_its_source() {
    let dir = temp_dir("docpack-rewrite-self-");
    let archive = dir.path().join("a.zip");
    let mut writer = ZipWriter::create(&archive, Compression::default()).unwrap();
    writer.write_deflated("x.txt", b"x", STAMP).unwrap();
    writer.finish().unwrap();

    let err = rewrite_archive(&archive, &archive).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(entry_names(&archive), ["x.txt"]);
}
