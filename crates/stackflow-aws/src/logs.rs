//! CloudWatch Logs

use stackflow_core::{
    LogicalId, RemovalPolicy, ResourceDraft, ResourceHandle, Result, StackBuilder, Value,
};

/// Log retention period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionDays {
    OneDay,
    ThreeDays,
    FiveDays,
    OneWeek,
    TwoWeeks,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    #[default]
    TwoYears,
    Infinite,
}

impl RetentionDays {
    /// Number of days, `None` for never expiring
    pub fn days(&self) -> Option<u32> {
        match self {
            RetentionDays::OneDay => Some(1),
            RetentionDays::ThreeDays => Some(3),
            RetentionDays::FiveDays => Some(5),
            RetentionDays::OneWeek => Some(7),
            RetentionDays::TwoWeeks => Some(14),
            RetentionDays::OneMonth => Some(30),
            RetentionDays::ThreeMonths => Some(90),
            RetentionDays::SixMonths => Some(180),
            RetentionDays::OneYear => Some(365),
            RetentionDays::TwoYears => Some(731),
            RetentionDays::Infinite => None,
        }
    }

    /// Closest supported value that keeps logs at least `days` long
    pub fn at_least(days: u32) -> Self {
        const ALL: [RetentionDays; 10] = [
            RetentionDays::OneDay,
            RetentionDays::ThreeDays,
            RetentionDays::FiveDays,
            RetentionDays::OneWeek,
            RetentionDays::TwoWeeks,
            RetentionDays::OneMonth,
            RetentionDays::ThreeMonths,
            RetentionDays::SixMonths,
            RetentionDays::OneYear,
            RetentionDays::TwoYears,
        ];
        ALL.into_iter()
            .find(|r| r.days().is_some_and(|d| d >= days))
            .unwrap_or(RetentionDays::Infinite)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogGroupProps {
    pub retention: RetentionDays,
    pub log_group_name: Option<String>,
    /// Defaults to `Retain`
    pub removal_policy: Option<RemovalPolicy>,
}

/// `AWS::Logs::LogGroup`
#[derive(Debug, Clone)]
pub struct LogGroup {
    handle: ResourceHandle,
}

impl LogGroup {
    pub fn new(builder: &mut StackBuilder, id: &str, props: LogGroupProps) -> Result<Self> {
        let draft = ResourceDraft::new(id, "AWS::Logs::LogGroup")
            .property_opt("RetentionInDays", props.retention.days())
            .property_opt("LogGroupName", props.log_group_name)
            .removal_policy(props.removal_policy.unwrap_or(RemovalPolicy::Retain));

        Ok(Self {
            handle: builder.add(draft)?,
        })
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn id(&self) -> &LogicalId {
        self.handle.id()
    }

    pub fn arn(&self) -> Value {
        self.handle.attribute("Arn")
    }

    pub fn name(&self) -> Value {
        self.handle.reference()
    }
}
