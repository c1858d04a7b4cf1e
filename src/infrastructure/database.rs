use crate::config::Config;
use anyhow::Context;
use bson::doc;
use mongodb::{Client, Database};
use tracing::info;

/// Connects to MongoDB and verifies the connection with a ping.
pub async fn setup_database(config: &Config) -> anyhow::Result<Database> {
    let uri = with_timeouts(&config.mongodb_uri);

    let client = Client::with_uri_str(&uri)
        .await
        .context("failed to connect to MongoDB")?;

    let db = client.database(&config.mongodb_database);
    db.run_command(doc! { "ping": 1 })
        .await
        .context("MongoDB ping failed")?;

    info!(
        "Connected to MongoDB database '{}'",
        config.mongodb_database
    );

    Ok(db)
}

// Bounded selection/connect timeouts so startup fails fast instead of
// hanging on an unreachable MongoDB.
fn with_timeouts(uri: &str) -> String {
    if uri.contains('?') {
        format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
    } else {
        format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_timeouts_appends_query() {
        assert_eq!(
            with_timeouts("mongodb://localhost:27017"),
            "mongodb://localhost:27017?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000"
        );
        assert_eq!(
            with_timeouts("mongodb://localhost:27017/?replicaSet=rs0"),
            "mongodb://localhost:27017/?replicaSet=rs0&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000"
        );
    }
}
