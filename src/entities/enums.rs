//! Closed value sets stored as TEXT columns.
//!
//! Each enum is parsed once at the boundary (`FromStr`) and carried typed
//! through the core, so no call site compares raw strings.

use crate::errors::Error;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Fee category a student can owe and pay against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    /// 学费
    #[sea_orm(string_value = "tuition")]
    Tuition,
    /// 午餐费
    #[sea_orm(string_value = "lunch")]
    Lunch,
    /// 午托费
    #[sea_orm(string_value = "nap")]
    Nap,
    /// 课后服务费
    #[sea_orm(string_value = "after_school")]
    AfterSchool,
    /// 社团费
    #[sea_orm(string_value = "club")]
    Club,
    /// 代办费, the prepaid wallet
    #[sea_orm(string_value = "agency")]
    Agency,
}

impl FeeType {
    /// All fee types in display order.
    pub const ALL: [Self; 6] = [
        Self::Tuition,
        Self::Lunch,
        Self::Nap,
        Self::AfterSchool,
        Self::Club,
        Self::Agency,
    ];

    /// Stored identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tuition => "tuition",
            Self::Lunch => "lunch",
            Self::Nap => "nap",
            Self::AfterSchool => "after_school",
            Self::Club => "club",
            Self::Agency => "agency",
        }
    }

    /// Label used on forms and exported sheets.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tuition => "学费",
            Self::Lunch => "午餐费",
            Self::Nap => "午托费",
            Self::AfterSchool => "课后服务费",
            Self::Club => "社团费",
            Self::Agency => "代办费",
        }
    }

    /// Column on `students` holding the owed amount for this fee type.
    #[must_use]
    pub const fn owed_column_name(self) -> &'static str {
        match self {
            Self::Tuition => "tuition_fee",
            Self::Lunch => "lunch_fee",
            Self::Nap => "nap_fee",
            Self::AfterSchool => "after_school_fee",
            Self::Club => "club_fee",
            Self::Agency => "agency_fee",
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|ft| ft.as_str() == trimmed || ft.label() == trimmed)
            .ok_or_else(|| Error::UnknownFeeType {
                value: s.to_string(),
            })
    }
}

/// Itemised spend against the agency-fee wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum AgencyItem {
    /// 校服
    #[sea_orm(string_value = "uniform")]
    Uniform,
    /// 教辅资料
    #[sea_orm(string_value = "textbooks")]
    Textbooks,
    /// 保险
    #[sea_orm(string_value = "insurance")]
    Insurance,
    /// 体检
    #[sea_orm(string_value = "health_check")]
    HealthCheck,
    /// 研学
    #[sea_orm(string_value = "study_trip")]
    StudyTrip,
    /// 点心
    #[sea_orm(string_value = "snacks")]
    Snacks,
    /// 学习用品
    #[sea_orm(string_value = "supplies")]
    Supplies,
}

impl AgencyItem {
    /// Every allowed deduction item.
    pub const ALL: [Self; 7] = [
        Self::Uniform,
        Self::Textbooks,
        Self::Insurance,
        Self::HealthCheck,
        Self::StudyTrip,
        Self::Snacks,
        Self::Supplies,
    ];

    /// Stored identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Textbooks => "textbooks",
            Self::Insurance => "insurance",
            Self::HealthCheck => "health_check",
            Self::StudyTrip => "study_trip",
            Self::Snacks => "snacks",
            Self::Supplies => "supplies",
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uniform => "校服",
            Self::Textbooks => "教辅资料",
            Self::Insurance => "保险",
            Self::HealthCheck => "体检",
            Self::StudyTrip => "研学",
            Self::Snacks => "点心",
            Self::Supplies => "学习用品",
        }
    }
}

impl fmt::Display for AgencyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgencyItem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|item| item.as_str() == trimmed || item.label() == trimmed)
            .ok_or_else(|| Error::UnknownAgencyItem {
                value: s.to_string(),
            })
    }
}

const DAILY_OPERATING_ITEMS: &[&str] = &[
    "办公费",
    "印刷费",
    "水电费",
    "邮电费",
    "物业管理费",
    "差旅费",
    "维修(护)费",
    "租赁费",
    "会议费",
    "培训费",
    "公务接待费",
    "专用材料费",
    "劳务费",
    "委托业务费",
    "公务用车运行维护费",
    "其他交通费用",
    "其他商品和服务支出",
];

const PERSONNEL_ITEMS: &[&str] = &[
    "基本工资",
    "津贴补贴",
    "奖金",
    "绩效工资",
    "社会保障缴费",
    "住房公积金",
    "医疗费",
    "其他工资福利支出",
];

/// School expense ledger category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    /// 日常公用支出
    #[sea_orm(string_value = "daily_operating")]
    DailyOperating,
    /// 人员支出
    #[sea_orm(string_value = "personnel")]
    Personnel,
}

impl ExpenseCategory {
    /// Both categories.
    pub const ALL: [Self; 2] = [Self::DailyOperating, Self::Personnel];

    /// Stored identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DailyOperating => "daily_operating",
            Self::Personnel => "personnel",
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DailyOperating => "日常公用支出",
            Self::Personnel => "人员支出",
        }
    }

    /// Items that may be filed under this category.
    #[must_use]
    pub const fn allowed_items(self) -> &'static [&'static str] {
        match self {
            Self::DailyOperating => DAILY_OPERATING_ITEMS,
            Self::Personnel => PERSONNEL_ITEMS,
        }
    }

    /// Returns the canonical item if it belongs to this category.
    pub fn validate_item(self, item: &str) -> Result<&'static str, Error> {
        let trimmed = item.trim();
        self.allowed_items()
            .iter()
            .copied()
            .find(|allowed| *allowed == trimmed)
            .ok_or_else(|| Error::UnknownExpenseItem {
                category: self.as_str().to_string(),
                item: item.to_string(),
            })
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == trimmed || c.label() == trimmed)
            .ok_or_else(|| Error::UnknownExpenseCategory {
                value: s.to_string(),
            })
    }
}
