use std::sync::Arc;

use chinchilla_config::{Category, EmbeddingProviderConfig};
use chinchilla_domain::{document::Document, filter::StructuredFilter};
use chinchilla_providers::embedding;
use chinchilla_storage::qdrant::QdrantStore;

use crate::{BoxFuture, Result, RetrieverFactory, RetrieverPort};

/// Embeds the query and searches one Qdrant collection.
pub struct VectorRetriever {
	store: Arc<QdrantStore>,
	embedding: EmbeddingProviderConfig,
	collection: String,
}
impl VectorRetriever {
	pub fn new(
		store: Arc<QdrantStore>,
		embedding: EmbeddingProviderConfig,
		collection: String,
	) -> Self {
		Self { store, embedding, collection }
	}

	async fn search(
		&self,
		query: &str,
		filter: Option<&StructuredFilter>,
		k: usize,
	) -> Result<Vec<Document>> {
		if k == 0 || query.trim().is_empty() {
			return Ok(Vec::new());
		}

		let vector = embedding::embed_query(&self.embedding, query).await?;
		let docs = self.store.search(&self.collection, vector, filter, k as u64).await?;

		Ok(docs)
	}
}
impl RetrieverPort for VectorRetriever {
	fn retrieve<'a>(
		&'a self,
		query: &'a str,
		filter: Option<&'a StructuredFilter>,
		k: usize,
	) -> BoxFuture<'a, Result<Vec<Document>>> {
		Box::pin(self.search(query, filter, k))
	}
}

/// Gives every category a retriever over its own collection, sharing one Qdrant client.
pub struct VectorRetrieverFactory {
	store: Arc<QdrantStore>,
	embedding: EmbeddingProviderConfig,
}
impl VectorRetrieverFactory {
	pub fn new(store: Arc<QdrantStore>, embedding: EmbeddingProviderConfig) -> Self {
		Self { store, embedding }
	}
}
impl RetrieverFactory for VectorRetrieverFactory {
	fn build(&self, _name: &str, category: &Category) -> Result<Arc<dyn RetrieverPort>> {
		Ok(Arc::new(VectorRetriever::new(
			Arc::clone(&self.store),
			self.embedding.clone(),
			category.collection.clone(),
		)))
	}
}
