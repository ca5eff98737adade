use super::*;
use tempfile::TempDir;

#[test]
fn local_backend_reads_files() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(temp_dir.path().join("NYTimes_part_1.csv"), b"Index\n1\n")
        .expect("should write partition");

    let source = LocalPartitions::new(temp_dir.path());
    let bytes = source
        .fetch_partition("NYTimes_part_1.csv")
        .expect("fetch should succeed");

    assert_eq!(bytes.as_deref(), Some(&b"Index\n1\n"[..]));
    assert_eq!(source.dir(), temp_dir.path());
}

#[test]
fn local_backend_reports_absent_partition() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let source = LocalPartitions::new(temp_dir.path());

    let bytes = source
        .fetch_partition("NYTimes_part_11.csv")
        .expect("absent partition is not an error");

    assert!(bytes.is_none());
}

#[test]
fn local_backend_surfaces_other_io_errors() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::create_dir(temp_dir.path().join("NYTimes_part_1.csv")).expect("should create dir");
    let source = LocalPartitions::new(temp_dir.path());

    assert!(source.fetch_partition("NYTimes_part_1.csv").is_err());
}
