//! Typed wrappers over the GraphQL operations the miner uses.
//!
//! Each call only shapes variables and normalises the response; errors are
//! returned to the caller untouched.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::client::TransportClient;
use crate::error::Result;
use crate::models::StreamNode;
use crate::operations::GqlOperation;

#[derive(Clone)]
pub struct CatalogClient {
    transport: Arc<TransportClient>,
}

impl CatalogClient {
    pub fn new(transport: Arc<TransportClient>) -> Self {
        Self { transport }
    }

    async fn call(&self, name: &str, variables: Value) -> Result<Value> {
        let operation = GqlOperation::new(name, Some(variables))?;
        self.transport.graphql_one(operation).await
    }

    pub async fn drops_dashboard(&self) -> Result<Value> {
        self.call("ViewerDropsDashboard", json!({ "fetchRewardCampaigns": false }))
            .await
    }

    pub async fn inventory(&self) -> Result<Value> {
        self.call("Inventory", json!({ "fetchRewardCampaigns": false }))
            .await
    }

    /// Live, drop-enabled channels for a directory slug, most relevant first.
    #[instrument(skip(self))]
    pub async fn streams_for_game(&self, slug: &str, limit: usize) -> Result<Vec<StreamNode>> {
        let response = self
            .call(
                "DirectoryPage_Game",
                json!({
                    "slug": slug,
                    "limit": limit,
                    "imageWidth": 50,
                    "includeIsDJ": false,
                    "sortTypeIsRecency": false,
                    "options": {
                        "broadcasterLanguages": [],
                        "freeformTags": null,
                        "includeRestricted": ["SUB_ONLY_LIVE"],
                        "recommendationsContext": { "platform": "web" },
                        "sort": "RELEVANCE",
                        "systemFilters": ["DROPS_ENABLED"],
                        "tags": [],
                        "requestID": "JIRA-VXP-2397",
                    },
                }),
            )
            .await?;

        let mut streams = parse_stream_nodes(&response);
        streams.truncate(limit);
        debug!(slug, count = streams.len(), "Fetched directory streams");
        Ok(streams)
    }

    /// Request a playback token for a channel. This is what registers watch time.
    pub async fn playback_access_token(&self, channel_login: &str) -> Result<Value> {
        self.call(
            "PlaybackAccessToken",
            json!({
                "isLive": true,
                "isVod": false,
                "login": channel_login,
                "platform": "web",
                "playerType": "site",
                "vodID": "",
            }),
        )
        .await
    }

    pub async fn channel_points_context(&self, channel_login: &str) -> Result<Value> {
        self.call("ChannelPointsContext", json!({ "channelLogin": channel_login }))
            .await
    }

    pub async fn current_drop_context(&self, channel_id: &str) -> Result<Value> {
        self.call(
            "DropCurrentSessionContext",
            json!({ "channelID": channel_id, "channelLogin": "" }),
        )
        .await
    }

    pub async fn claim_drop(&self, drop_instance_id: &str) -> Result<Value> {
        self.call(
            "DropsPage_ClaimDropRewards",
            json!({ "input": { "dropInstanceID": drop_instance_id } }),
        )
        .await
    }

    pub async fn claim_community_points(&self, claim_id: &str, channel_id: &str) -> Result<Value> {
        self.call(
            "ClaimCommunityPoints",
            json!({ "input": { "claimID": claim_id, "channelID": channel_id } }),
        )
        .await
    }

    /// Resolve a display name to its directory slug, if the platform knows it.
    #[instrument(skip(self))]
    pub async fn slug_redirect(&self, name: &str) -> Result<Option<String>> {
        let response = self
            .call("DirectoryGameRedirect", json!({ "name": name }))
            .await?;
        Ok(response
            .pointer("/data/game/slug")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

/// Flatten `data.game.streams.edges[].node` into stream nodes.
pub fn parse_stream_nodes(response: &Value) -> Vec<StreamNode> {
    let Some(edges) = response
        .pointer("/data/game/streams/edges")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    edges
        .iter()
        .filter_map(|edge| edge.get("node"))
        .map(|node| {
            let broadcaster = node.get("broadcaster");
            let text = |value: Option<&Value>| {
                value
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            StreamNode {
                id: text(node.get("id")),
                user_login: text(broadcaster.and_then(|b| b.get("login"))),
                user_name: text(broadcaster.and_then(|b| b.get("displayName"))),
                title: text(node.get("title")),
                viewer_count: node
                    .get("viewersCount")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
                language: broadcaster
                    .and_then(|b| b.pointer("/broadcastSettings/language"))
                    .and_then(Value::as_str)
                    .unwrap_or("en")
                    .to_string(),
            }
        })
        .collect()
}
