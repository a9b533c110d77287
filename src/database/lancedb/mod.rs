// LanceDB vector index
// Persists chunk embeddings in a LanceDB table and runs L2 nearest-neighbour search over them


use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::database::CreateTableMode;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use tracing::{debug, error, info};

use super::{Backend, IndexEntry, ScoredChunk, VectorIndex};
use crate::documents::DocumentMetadata;
use crate::embeddings::chunking::Chunk;
use crate::{RagError, Result};

pub const TABLE_NAME: &str = "mrm_documents";

/// Rows written per record batch
const WRITE_BATCH_SIZE: usize = 1024;

/// Vector index stored in a LanceDB table
pub struct LanceIndex {
    table: Table,
    dimension: usize,
}

impl LanceIndex {
    /// Write `entries` as a new version of the table at `dir`.
    ///
    /// The overwrite is a single commit. Handles opened on an earlier
    /// version keep reading that version.
    #[inline]
    pub async fn create(dir: &Path, entries: Vec<IndexEntry>, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let schema = create_schema(dimension)?;
        let batches = entries
            .chunks(WRITE_BATCH_SIZE)
            .map(|batch| create_record_batch(&schema, batch, dimension))
            .collect::<Result<Vec<_>>>()?;
        let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), Arc::clone(&schema));

        let connection = connect(dir).await?;
        let table = connection
            .create_table(TABLE_NAME, reader)
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to write table: {}", e)))?;

        info!(
            "Stored {} embeddings with {} dimensions in {}",
            entries.len(),
            dimension,
            dir.display()
        );
        Ok(Self { table, dimension })
    }

    /// Open the existing table at `dir`
    #[inline]
    pub async fn open(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            return Err(RagError::IndexNotFound(dir.display().to_string()));
        }

        let connection = connect(dir).await?;
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.iter().any(|name| name == TABLE_NAME) {
            return Err(RagError::IndexNotFound(format!(
                "{} (no {} table)",
                dir.display(),
                TABLE_NAME
            )));
        }

        let table = connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))?;

        let dimension = detect_vector_dimension(&table).await?;
        info!(
            "Opened LanceDB index at {} with {} dimensions",
            dir.display(),
            dimension
        );
        Ok(Self { table, dimension })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Parse search results from LanceDB stream
    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<ScoredChunk>> {
        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    #[inline]
    fn backend(&self) -> Backend {
        Backend::Lance
    }

    #[inline]
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dimension {
            return Err(RagError::Database(format!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        debug!("Searching for {} nearest chunks", k);

        let results = self
            .table
            .vector_search(query)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Self::parse_search_results_stream(results).await?;
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    #[inline]
    async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }
}

async fn connect(dir: &Path) -> Result<Connection> {
    let uri = dir.display().to_string();
    debug!("Connecting to LanceDB at {}", uri);

    lancedb::connect(&uri).execute().await.map_err(|e| {
        error!("Failed to connect to LanceDB: {}", e);
        RagError::Database(format!("Failed to connect to LanceDB: {}", e))
    })
}

/// Detect vector dimension from existing table schema
async fn detect_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

    schema
        .fields()
        .iter()
        .find(|field| field.name() == "vector")
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
        .ok_or_else(|| {
            RagError::Database("Could not find vector column or determine dimension".to_string())
        })
}

fn create_schema(dimension: usize) -> Result<Arc<Schema>> {
    let list_size = i32::try_from(dimension)
        .map_err(|_| RagError::Database(format!("Vector dimension {} is too large", dimension)))?;

    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                list_size,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, false),
        Field::new("total_pages", DataType::UInt32, false),
        Field::new("chunk_index", DataType::UInt32, false),
    ])))
}

fn create_record_batch(
    schema: &Arc<Schema>,
    entries: &[IndexEntry],
    dimension: usize,
) -> Result<RecordBatch> {
    let len = entries.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * dimension);
    let mut contents = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut pages = Vec::with_capacity(len);
    let mut total_pages = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);

    for entry in entries {
        if entry.vector.len() != dimension {
            return Err(RagError::Database(format!(
                "Entry {} has {} dimensions, expected {}",
                entry.id,
                entry.vector.len(),
                dimension
            )));
        }

        ids.push(entry.id.as_str());
        flat_values.extend_from_slice(&entry.vector);
        contents.push(entry.chunk.content.as_str());
        sources.push(entry.chunk.metadata.source.as_str());
        pages.push(entry.chunk.metadata.page);
        total_pages.push(entry.chunk.metadata.total_pages);
        chunk_indices.push(u32::try_from(entry.chunk.chunk_index).unwrap_or(u32::MAX));
    }

    let list_size = i32::try_from(dimension)
        .map_err(|_| RagError::Database(format!("Vector dimension {} is too large", dimension)))?;
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array = FixedSizeListArray::try_new(
        field,
        list_size,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(sources)),
        Arc::new(UInt32Array::from(pages)),
        Arc::new(UInt32Array::from(total_pages)),
        Arc::new(UInt32Array::from(chunk_indices)),
    ];

    RecordBatch::try_new(Arc::clone(schema), arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
    let contents = string_column(batch, "content")?;
    let sources = string_column(batch, "source")?;
    let pages = u32_column(batch, "page")?;
    let total_pages = u32_column(batch, "total_pages")?;
    let chunk_indices = u32_column(batch, "chunk_index")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let hits = (0..batch.num_rows())
        .map(|row| ScoredChunk {
            chunk: Chunk {
                content: contents.value(row).to_string(),
                metadata: DocumentMetadata {
                    source: sources.value(row).to_string(),
                    page: pages.value(row),
                    total_pages: total_pages.value(row),
                },
                chunk_index: chunk_indices.value(row) as usize,
            },
            distance: distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) }),
        })
        .collect();

    Ok(hits)
}
