use super::*;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent directories");
    }
    fs::write(&path, content).expect("should write test file");
    path
}

#[test]
fn supports_known_extensions_case_insensitively() {
    let loader = FileLoader;
    assert!(loader.supports(Path::new("policy.pdf")));
    assert!(loader.supports(Path::new("POLICY.PDF")));
    assert!(loader.supports(Path::new("notes.txt")));
    assert!(loader.supports(Path::new("readme.md")));
    assert!(!loader.supports(Path::new("slides.pptx")));
    assert!(!loader.supports(Path::new("no_extension")));
}

#[test]
fn loads_text_file_as_single_page() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_file(
        temp_dir.path(),
        "sr11-7.txt",
        b"Model validation requires independent review under SR 11-7.",
    );

    let documents = FileLoader.load(&path).expect("should load text file");

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].metadata.page, 0);
    assert_eq!(documents[0].metadata.total_pages, 1);
    assert_eq!(documents[0].metadata.source, path.display().to_string());
    assert!(documents[0].content.contains("independent review"));
}

#[test]
fn empty_text_file_yields_no_documents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_file(temp_dir.path(), "empty.txt", b"   \n\n ");

    let documents = FileLoader.load(&path).expect("should load empty file");
    assert!(documents.is_empty());
}

#[test]
fn corrupt_pdf_is_a_load_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = write_file(temp_dir.path(), "broken.pdf", b"this is not a pdf");

    let result = FileLoader.load(&path);
    assert!(matches!(result, Err(RagError::Load(_))));
}

#[test]
fn discover_documents_walks_recursively_and_sorts() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_file(temp_dir.path(), "b.txt", b"b");
    write_file(temp_dir.path(), "nested/deeper/a.md", b"a");
    write_file(temp_dir.path(), "nested/ignored.docx", b"x");

    let files = discover_documents(temp_dir.path(), &FileLoader);

    assert_eq!(files.len(), 2);
    assert!(files.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(files.iter().all(|f| FileLoader.supports(f)));
}

#[test]
fn discover_documents_missing_directory() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let files = discover_documents(&temp_dir.path().join("missing"), &FileLoader);
    assert!(files.is_empty());
}

#[test]
fn load_documents_skips_failures_and_unsupported() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let good = write_file(temp_dir.path(), "good.txt", b"Model risk tiering.");
    let broken = write_file(temp_dir.path(), "broken.pdf", b"garbage");
    let unsupported = write_file(temp_dir.path(), "image.png", b"\x89PNG");
    let missing = temp_dir.path().join("missing.txt");

    let paths = vec![good, broken, unsupported, missing];

    let documents = load_documents(&FileLoader, Some(paths.as_slice()), temp_dir.path());

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].content, "Model risk tiering.");
}

#[test]
fn load_documents_scans_directory_when_no_paths() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write_file(temp_dir.path(), "one.txt", b"first");
    write_file(temp_dir.path(), "sub/two.txt", b"second");

    let documents = load_documents(&FileLoader, None, temp_dir.path());
    assert_eq!(documents.len(), 2);
}
