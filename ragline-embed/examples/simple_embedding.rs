//! Simple example embedding a few sentences and asking a question against them
//!
//! Requires `OPENAI_API_KEY` in the environment.

use ragline_embed::{
    AnswerComposer, ChatConfig, ChatMessage, EmbedConfig, EmbeddingProvider, OpenAiChat,
    OpenAiEmbedder,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let api_key = std::env::var("OPENAI_API_KEY")?;

    println!("🤖 ragline-embed - Embedding Example");
    println!("====================================");

    let config = EmbedConfig::new(api_key.clone()).with_batch_size(2);
    println!("📝 Creating OpenAI embedder with config:");
    println!("   Model: {}", config.model);
    println!("   Batch size: {}", config.batch_size);

    let provider = OpenAiEmbedder::new(config)?;

    println!("\n📊 Generating embedding for single text...");
    let text = "Hello, this is a test sentence for embedding generation.";
    let embedding = provider.embed_text(text).await?;
    println!("   Text: \"{text}\"");
    println!("   Embedding dimension: {}", embedding.len());
    println!(
        "   First 5 values: {:?}",
        &embedding[..5.min(embedding.len())]
    );

    println!("\n📊 Generating embeddings for multiple texts...");
    let texts = vec![
        "Rust is a systems programming language.".to_string(),
        "Embeddings map text to points in a vector space.".to_string(),
        "Machine learning models process natural language.".to_string(),
    ];
    let result = provider.embed_texts(&texts).await?;
    println!("   Generated {} embeddings", result.len());
    println!("   Embedding dimension: {}", result.dimension);
    println!("   Provider: {}", provider.provider_name());

    println!("\n💬 Asking the chat model...");
    let chat = OpenAiChat::new(ChatConfig::new(api_key))?;
    let answer = chat
        .complete(&[
            ChatMessage::system("Answer in one short sentence."),
            ChatMessage::user(texts.join("\n")),
            ChatMessage::user("What kind of language is Rust?"),
        ])
        .await?;
    println!("   Answer: {answer}");

    Ok(())
}
