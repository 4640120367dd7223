use reader_core::model::UserProfile;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub share_user: String,
    #[serde(default)]
    pub chapter_name: String,
    #[serde(default)]
    pub super_chapter_name: String,
    #[serde(default)]
    pub nice_date: String,
    #[serde(default)]
    pub fresh: bool,
    #[serde(default)]
    pub collect: bool,
}

impl Article {
    /// Author, falling back to the sharing user for shared posts.
    pub fn byline(&self) -> &str {
        if self.author.is_empty() {
            &self.share_user
        } else {
            &self.author
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image_path: String,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ArticleListing {
    pub(crate) cur_page: u32,
    #[serde(default)]
    pub(crate) datas: Vec<Article>,
    #[serde(default)]
    pub(crate) over: bool,
    #[serde(default)]
    pub(crate) page_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub coin_count: i64,
}

impl LoginPayload {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            nickname: self.nickname.clone(),
            coin_count: self.coin_count,
            level: 0,
            rank: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserInfoPayload {
    pub(crate) user_info: LoginPayload,
    #[serde(default)]
    pub(crate) coin_info: Option<CoinInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CoinInfo {
    #[serde(default)]
    pub(crate) coin_count: i64,
    #[serde(default)]
    pub(crate) level: i64,
    #[serde(default, deserialize_with = "string_or_number")]
    pub(crate) rank: String,
}

impl UserInfoPayload {
    pub(crate) fn into_profile(self) -> UserProfile {
        let mut profile = self.user_info.profile();
        if let Some(coins) = self.coin_info {
            profile.coin_count = coins.coin_count;
            profile.level = coins.level;
            profile.rank = coins.rank;
        }
        profile
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => value,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
