//! Quick-Ask Catalog
//!
//! Canned analysis requests offered as one-tap buttons. The label is what
//! the viewer sees in the transcript; the prompt is what goes to the server.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A canned analysis topic
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickTopic {
    /// Character strengths
    Personality,
    /// Appearance and bearing
    Avatar,
    /// Portrait of the destined partner
    PartnerAvatar,
    /// Career direction
    Career,
    /// Wealth over the next three years
    Wealth,
    /// Health advice
    Health,
    /// Most likely year for romance
    LoveTiming,
}

impl QuickTopic {
    /// Every topic, in button order
    pub const ALL: [Self; 7] = [
        Self::Personality,
        Self::Avatar,
        Self::PartnerAvatar,
        Self::Career,
        Self::Wealth,
        Self::Health,
        Self::LoveTiming,
    ];

    /// Stable key used by surfaces and the CLI
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Personality => "personality",
            Self::Avatar => "avatar",
            Self::PartnerAvatar => "partner_avatar",
            Self::Career => "career",
            Self::Wealth => "wealth",
            Self::Health => "health",
            Self::LoveTiming => "love_timing",
        }
    }

    /// Button label, appended to the transcript as the user's message
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Personality => "性格优势",
            Self::Avatar => "人物画像",
            Self::PartnerAvatar => "正缘画像",
            Self::Career => "事业方向",
            Self::Wealth => "三年财运",
            Self::Health => "健康建议",
            Self::LoveTiming => "感情应期",
        }
    }

    /// The prompt actually sent
    #[must_use]
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Personality => "结合原局，用子平和盲派深度分析人物性格优势",
            Self::Avatar => {
                "结合原局（加入性别），用子平和盲派深度分析人物画像身高体型气质动作等等"
            }
            Self::PartnerAvatar => "结合原局（加入性别），用子平和盲派深度分析正缘人物画像",
            Self::Career => {
                "结合原局和大运流年，用子平和盲派深度分析事业方向和可执行的建议（需引导用户加上当前工作背景，如果是问学业需要强调哪些年期间读高中/大学，学业情况如何）"
            }
            Self::Wealth => {
                "结合原局和大运流年，用子平和盲派深度分析未来3年每年财运吉凶和可执行的建议"
            }
            Self::Health => "结合原局和大运流年，用子平和盲派深度分析健康建议",
            Self::LoveTiming => {
                "结合原局和大运流年，用子平和盲派深度分析哪个流年应期概率最高（需要引导客户补充背景，当前单身/有对象，已婚/离异）"
            }
        }
    }

    /// Look a topic up by key
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.key() == key)
    }
}

impl fmt::Display for QuickTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error for an unknown topic key
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown quick-ask topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for QuickTopic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| UnknownTopic(s.to_string()))
    }
}

/// Prompt for a button press: the canned prompt for a known key, else the
/// label itself
#[must_use]
pub fn resolve_prompt(key: &str, label: &str) -> String {
    QuickTopic::from_key(key).map_or_else(|| label.to_string(), |t| t.prompt().to_string())
}
