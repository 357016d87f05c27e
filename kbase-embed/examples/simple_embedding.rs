//! Embeds a few policy sentences with the default model and prints their distances

use kbase_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let temp_dir = tempfile::tempdir()?;
    let config = EmbedConfig::default()
        .with_cache_dir(temp_dir.path())
        .with_batch_size(2);

    println!("Model: {} ({})", config.model_name(), config.model_id());
    println!("Batch size: {}", config.batch_size);

    let provider = FastEmbedProvider::create(config).await?;
    println!("Dimension: {}", provider.embedding_dimension());

    let texts = vec![
        "Refunds are issued within 14 days of purchase.".to_string(),
        "Employees receive 20 days of paid leave per year.".to_string(),
        "Customers may return items for a full refund.".to_string(),
    ];
    let result = provider.embed_texts(&texts).await?;

    let query = "How long do refunds take?";
    let query_vec = provider.embed_text(query).await?;

    println!("\nQuery: \"{query}\"");
    for (text, embedding) in texts.iter().zip(result.embeddings.iter()) {
        println!("  {:>8.4}  {text}", squared_l2(&query_vec, embedding));
    }

    Ok(())
}
