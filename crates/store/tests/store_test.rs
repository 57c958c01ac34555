use store::{
    ChunkIndex, ChunkMetadata, Condition, Field, IndexedChunk, LanceChunkIndex, Predicate,
    PredicateBuilder,
};
use tempfile::tempdir;

const DIM: usize = 8;

/// Create a test embedding with given seed values
fn make_embedding(seed: &[f32]) -> Vec<f32> {
    let mut emb = vec![0.0f32; DIM];
    for (i, &v) in seed.iter().enumerate().take(DIM) {
        emb[i] = v;
    }
    emb
}

fn make_chunk(source_id: &str, bucket: &str, district: &str, seed: &[f32]) -> IndexedChunk {
    IndexedChunk {
        chunk_id: String::new(),
        text: format!("{} {} 채용", district, bucket),
        metadata: ChunkMetadata {
            source_id: source_id.to_string(),
            bucket: Some(bucket.to_string()),
            location: Some("서울".to_string()),
            district: Some(district.to_string()),
            salary_label: None,
        },
        embedding: make_embedding(seed),
    }
}

#[tokio::test]
async fn test_cosine_ordering() {
    let dir = tempdir().unwrap();
    let index = LanceChunkIndex::new(dir.path().to_path_buf(), DIM).await.unwrap();

    index.add_chunks(vec![
        make_chunk("job-1", "backend", "강남구", &[1.0, 0.0, 0.0]),
        make_chunk("job-2", "backend", "강남구", &[0.0, 1.0, 0.0]),
        // Larger magnitude than the others; cosine ignores length
        make_chunk("job-3", "backend", "강남구", &[0.0, 0.0, 5.0]),
    ]).await.unwrap();

    let hits = index.query(make_embedding(&[0.0, 0.1, 1.0]), &Predicate::Empty, 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].metadata.source_id, "job-3");
    assert_eq!(hits[1].metadata.source_id, "job-2");
}

#[tokio::test]
async fn test_filter_applies_before_top_k() {
    let dir = tempdir().unwrap();
    let index = LanceChunkIndex::new(dir.path().to_path_buf(), DIM).await.unwrap();

    index.add_chunks(vec![
        make_chunk("near", "backend", "성동구", &[1.0, 0.0]),
        make_chunk("far", "backend", "강남구", &[0.0, 1.0]),
    ]).await.unwrap();

    // The only matching chunk is the least similar; it must still come back with top_k = 1
    let predicate = Predicate::Single(Condition::eq(Field::District, "강남구"));
    let hits = index.query(make_embedding(&[1.0, 0.0]), &predicate, 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.source_id, "far");
}

#[tokio::test]
async fn test_membership_and_conjunction() {
    let dir = tempdir().unwrap();
    let index = LanceChunkIndex::new(dir.path().to_path_buf(), DIM).await.unwrap();

    index.add_chunks(vec![
        make_chunk("a", "backend", "강남구", &[1.0]),
        make_chunk("b", "frontend", "강남구", &[1.0]),
        make_chunk("c", "backend", "성동구", &[1.0]),
        make_chunk("d", "backend", "도봉구", &[1.0]),
    ]).await.unwrap();

    let mut builder = PredicateBuilder::new();
    builder
        .push(Condition::eq(Field::Bucket, "backend"))
        .push_opt(Condition::one_of(Field::District, vec!["강남구".into(), "성동구".into()]));
    let hits = index.query(make_embedding(&[1.0]), &builder.build(), 10).await.unwrap();

    let mut ids: Vec<_> = hits.iter().map(|h| h.metadata.source_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "c"]);
}

#[tokio::test]
async fn test_persistence_and_empty_index() {
    let dir = tempdir().unwrap();

    {
        let index = LanceChunkIndex::new(dir.path().to_path_buf(), DIM).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query(make_embedding(&[1.0]), &Predicate::Empty, 5).await.unwrap().is_empty());
        index.add_chunks(vec![make_chunk("job-1", "data", "강남구", &[1.0])]).await.unwrap();
    }

    // Reopen and verify data persisted
    let index = LanceChunkIndex::new(dir.path().to_path_buf(), DIM).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 1);
    let hits = index.query(make_embedding(&[1.0]), &Predicate::Empty, 5).await.unwrap();
    assert_eq!(hits[0].metadata.bucket.as_deref(), Some("data"));
    assert_eq!(hits[0].metadata.salary_label, None);
}
