//! Persisted GraphQL queries.
//!
//! Twitch accepts operations referenced by a sha256 hash instead of the full
//! query text. Only operations listed in [`PERSISTED_QUERIES`] can be built.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedQuery {
    pub name: &'static str,
    pub sha256: &'static str,
}

pub static PERSISTED_QUERIES: &[PersistedQuery] = &[
    // all available campaigns
    PersistedQuery {
        name: "ViewerDropsDashboard",
        sha256: "5a4da2ab3d5b47c9f9ce864e727b2cb346af1e3ea8b897fe8f704a97ff017619",
    },
    // in-progress campaigns
    PersistedQuery {
        name: "Inventory",
        sha256: "09acb7d3d7e605a92bdfdcc465f6aa481b71c234d8686a9ba38ea5ed51507592",
    },
    // live channels for a game
    PersistedQuery {
        name: "DirectoryPage_Game",
        sha256: "c7c9d5aad09155c4161d2382092dc44610367f3536aac39019ec2582ae5065f9",
    },
    PersistedQuery {
        name: "PlaybackAccessToken",
        sha256: "ed230aa1e33e07eebb8928504583da78a5173989fadfb1ac94be06a04f3cdbe9",
    },
    PersistedQuery {
        name: "ChannelPointsContext",
        sha256: "374314de591e69925fce3ddc2bcf085796f56ebb8cad67a0daa3165c03adc345",
    },
    PersistedQuery {
        name: "DropsPage_ClaimDropRewards",
        sha256: "a455deea71bdc9015b78eb49f4acfbce8baa7ccbedd28e549bb025bd0f751930",
    },
    PersistedQuery {
        name: "ClaimCommunityPoints",
        sha256: "46aaeebe02c99afdf4fc97c7c0cba964124bf6b0af229395f1f6d1feed05b3d0",
    },
    PersistedQuery {
        name: "DropCurrentSessionContext",
        sha256: "4d06b702d25d652afb9ef835d2a550031f1cf762b193523a92166f40ea3d142b",
    },
    PersistedQuery {
        name: "DropCampaignDetails",
        sha256: "039277bf98f3130929262cc7c6efd9c141ca3749cb6dca442fc8ead9a53f77c1",
    },
    PersistedQuery {
        name: "DropsHighlightService_AvailableDrops",
        sha256: "9a62a09bce5b53e26e64a671e530bc599cb6aab1e5ba3cbd5d85966d3940716f",
    },
    PersistedQuery {
        name: "VideoPlayerStreamInfoOverlayChannel",
        sha256: "198492e0857f6aedead9665c81c5a06d67b25b58034649687124083ff288597d",
    },
    // game name -> directory slug
    PersistedQuery {
        name: "DirectoryGameRedirect",
        sha256: "1f0300090caceec51f33c5e20647aceff9017f740f223c3c532ba6fa59f6b6cc",
    },
];

pub fn lookup(name: &str) -> Option<&'static PersistedQuery> {
    PERSISTED_QUERIES.iter().find(|q| q.name == name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GqlOperation {
    pub operation_name: String,
    pub extensions: Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extensions {
    pub persisted_query: PersistedQueryRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueryRef {
    pub version: u8,
    pub sha256_hash: String,
}

impl GqlOperation {
    /// Build an operation from the known table.
    ///
    /// Fails with [`Error::UnknownOperation`] for names outside the table, so a
    /// typo never reaches the network.
    pub fn new(name: &str, variables: Option<Value>) -> Result<Self> {
        let query = lookup(name).ok_or_else(|| Error::UnknownOperation(name.to_string()))?;
        Ok(Self {
            operation_name: query.name.to_string(),
            extensions: Extensions {
                persisted_query: PersistedQueryRef {
                    version: 1,
                    sha256_hash: query.sha256.to_string(),
                },
            },
            variables,
        })
    }
}
