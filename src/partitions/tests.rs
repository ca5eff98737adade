use super::*;
use std::cell::RefCell;
use std::rc::Rc;
use tempfile::TempDir;

/// In-memory backend that records every fetch
#[derive(Debug, Default)]
struct MemoryPartitions {
    files: HashMap<String, Vec<u8>>,
    fetched: Rc<RefCell<Vec<String>>>,
}

impl PartitionSource for MemoryPartitions {
    fn fetch_partition(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.fetched.borrow_mut().push(name.to_string());
        Ok(self.files.get(name).cloned())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

fn article(index: u64) -> ArticleRow {
    ArticleRow {
        index,
        text: format!("Body of article {}, with a comma", index),
        link: format!("https://news.example.com/{}", index),
        headline: format!("Headline {}", index),
        short_description: format!("Short \"quoted\" description {}", index),
        date: "2022-09-23".to_string(),
    }
}

fn partition_csv(rows: impl IntoIterator<Item = ArticleRow>) -> Vec<u8> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).expect("should serialize row");
    }
    writer.into_inner().expect("should flush csv")
}

/// `partitions` partitions of `size` rows with `Index` 1..=partitions*size
fn memory_corpus(partitions: usize, size: usize, dataset: &DatasetConfig) -> MemoryPartitions {
    let mut files = HashMap::new();
    for partition in 1..=partitions {
        let first = ((partition - 1) * size + 1) as u64;
        let last = (partition * size) as u64;
        files.insert(
            dataset.partition_file_name(partition),
            partition_csv((first..=last).map(article)),
        );
    }
    MemoryPartitions {
        files,
        fetched: Rc::default(),
    }
}

fn dataset(partition_size: usize) -> DatasetConfig {
    DatasetConfig {
        partition_size,
        ..DatasetConfig::default()
    }
}

#[test]
fn partition_boundaries() {
    assert_eq!(partition_for(0, 990), 1);
    assert_eq!(partition_for(989, 990), 1);
    assert_eq!(partition_for(990, 990), 2);
    assert_eq!(partition_for(9899, 990), 10);
    assert_eq!(partition_for(10000, 990), 11);
    assert_eq!(partition_for(4, 1), 5);
}

#[test]
fn boundary_rows_resolve_from_their_partitions() {
    let dataset = dataset(990);
    let source = memory_corpus(10, 990, &dataset);
    let store = PartitionStore::new(Box::new(source), dataset).expect("should create store");

    let table = store
        .resolve_rows(&[989, 990])
        .expect("rows should resolve");

    let headlines: Vec<&str> = table.headlines().collect();
    assert_eq!(headlines, vec!["Headline 990", "Headline 991"]);
}

#[test]
fn boundary_rows_load_expected_partition_files() {
    let dataset = dataset(990);
    let source = memory_corpus(10, 990, &dataset);
    let fetched = Rc::clone(&source.fetched);
    let store = PartitionStore::new(Box::new(source), dataset).expect("should create store");

    store.resolve_rows(&[989]).expect("row should resolve");
    store.resolve_rows(&[990]).expect("row should resolve");

    assert_eq!(
        *fetched.borrow(),
        vec!["NYTimes_part_1.csv", "NYTimes_part_2.csv"]
    );
}

#[test]
fn out_of_range_row_is_reported() {
    let dataset = dataset(990);
    let source = memory_corpus(10, 990, &dataset);
    let store = PartitionStore::new(Box::new(source), dataset).expect("should create store");

    let result = store.resolve_rows(&[3, 10000]);

    match result {
        Err(NewsError::RowNotFound(missing)) => {
            assert_eq!(
                missing,
                vec![MissingRow {
                    index: 10000,
                    partition: 11
                }]
            );
        }
        other => panic!("expected RowNotFound, got {:?}", other),
    }
}

#[test]
fn resolve_keeps_found_rows_next_to_missing_ones() {
    let dataset = dataset(4);
    let mut source = memory_corpus(2, 4, &dataset);
    // Partition 2 lost the row with Index 6
    source.files.insert(
        dataset.partition_file_name(2),
        partition_csv([5, 7, 8].into_iter().map(article)),
    );
    let store = PartitionStore::new(Box::new(source), dataset).expect("should create store");

    let resolution = store.resolve(&[0, 5, 6]).expect("resolve should succeed");

    assert_eq!(resolution.table.len(), 2);
    assert_eq!(
        resolution.missing,
        vec![MissingRow {
            index: 5,
            partition: 2
        }]
    );
    assert!(matches!(
        resolution.into_table(),
        Err(NewsError::RowNotFound(_))
    ));
}

#[test]
fn preserves_request_order_and_duplicates() {
    let dataset = dataset(3);
    let source = memory_corpus(3, 3, &dataset);
    let store = PartitionStore::new(Box::new(source), dataset).expect("should create store");

    let table = store
        .resolve_rows(&[7, 0, 4, 0, 8])
        .expect("rows should resolve");

    let indices: Vec<u64> = table.rows().iter().map(|row| row.index).collect();
    assert_eq!(indices, vec![8, 1, 5, 1, 9]);
    assert_eq!(
        table.links().next(),
        Some("https://news.example.com/8")
    );
}

#[test]
fn each_partition_is_fetched_once_per_batch() {
    let dataset = dataset(3);
    let source = memory_corpus(3, 3, &dataset);
    let fetched = Rc::clone(&source.fetched);
    let store = PartitionStore::new(Box::new(source), dataset).expect("should create store");

    store
        .resolve_rows(&[0, 1, 2, 6, 7, 0])
        .expect("rows should resolve");
    assert_eq!(
        *fetched.borrow(),
        vec!["NYTimes_part_1.csv", "NYTimes_part_3.csv"]
    );

    // A new batch starts with an empty cache
    store.resolve_rows(&[1]).expect("rows should resolve");
    assert_eq!(fetched.borrow().len(), 3);
    assert_eq!(fetched.borrow()[2], "NYTimes_part_1.csv");
}

#[test]
fn resolution_is_idempotent() {
    let dataset = dataset(5);
    let source = memory_corpus(4, 5, &dataset);
    let store = PartitionStore::new(Box::new(source), dataset).expect("should create store");
    let indices = [19, 3, 11, 3, 0];

    let first = store.resolve_rows(&indices).expect("rows should resolve");
    let second = store.resolve_rows(&indices).expect("rows should resolve");

    assert_eq!(first, second);
    assert_eq!(first.rows()[0], article(20));
}

#[test]
fn csv_fields_round_trip_through_partition() {
    let dataset = dataset(2);
    let source = memory_corpus(1, 2, &dataset);
    let store = PartitionStore::new(Box::new(source), dataset).expect("should create store");

    let table = store.resolve_rows(&[1]).expect("row should resolve");

    assert_eq!(table.into_rows(), vec![article(2)]);
}

#[test]
fn malformed_partition_is_an_error() {
    let dataset = dataset(2);
    let mut source = MemoryPartitions::default();
    source.files.insert(
        dataset.partition_file_name(1),
        b"Index,link,headline\nnot-a-number,x,y\n".to_vec(),
    );
    let store = PartitionStore::new(Box::new(source), dataset).expect("should create store");

    assert!(matches!(
        store.resolve_rows(&[0]),
        Err(NewsError::Partition(_))
    ));
}

#[test]
fn zero_partition_size_is_rejected() {
    let result = PartitionStore::new(Box::new(MemoryPartitions::default()), dataset(0));
    assert!(matches!(result, Err(NewsError::Config(_))));
}

#[test]
fn local_store_from_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("should load config");
    config.dataset.partition_size = 2;
    let dataset = config.resolved_dataset();
    std::fs::create_dir_all(&dataset.partition_dir).expect("should create partition dir");
    for partition in 1..=2u64 {
        let first = (partition - 1) * 2 + 1;
        std::fs::write(
            dataset.partition_dir.join(dataset.partition_file_name(partition as usize)),
            partition_csv((first..first + 2).map(article)),
        )
        .expect("should write partition");
    }

    let store = PartitionStore::from_config(&config).expect("should create store");
    let table = store.resolve_rows(&[3, 0]).expect("rows should resolve");

    let headlines: Vec<&str> = table.headlines().collect();
    assert_eq!(headlines, vec!["Headline 4", "Headline 1"]);
    assert_eq!(store.partition_size(), 2);
}
