//! Content licenses: usage terms, revenue split and the license lifecycle.
//!
//! A license attaches to one (content, holder) pair. It is issued, then
//! acquired by the holder, then used until its limit or expiry; it can be
//! revoked at any point before that.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::{
    Aggregate, AggregateType, ContentId, CorrelationId, DomainError, DomainResult, EventAction,
    EventBuffer, ExpirationPolicy, OwnerId, ValidationError, ValueObject,
};

// ============================================================================
// Revenue model
// ============================================================================

/// Percentage split of license revenue. Shares always total exactly 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRevenueModel")]
pub struct RevenueModel {
    author_share: u32,
    platform_share: u32,
    affiliate_share: u32,
    charity_share: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRevenueModel {
    author_share: u32,
    platform_share: u32,
    #[serde(default)]
    affiliate_share: u32,
    #[serde(default)]
    charity_share: u32,
}

impl TryFrom<RawRevenueModel> for RevenueModel {
    type Error = ValidationError;

    fn try_from(raw: RawRevenueModel) -> Result<Self, Self::Error> {
        Self::new(
            raw.author_share,
            raw.platform_share,
            raw.affiliate_share,
            raw.charity_share,
        )
    }
}

impl RevenueModel {
    pub fn new(
        author_share: u32,
        platform_share: u32,
        affiliate_share: u32,
        charity_share: u32,
    ) -> Result<Self, ValidationError> {
        Self {
            author_share,
            platform_share,
            affiliate_share,
            charity_share,
        }
        .validated()
    }

    /// Everything to the author
    pub fn author_only() -> Self {
        Self {
            author_share: 100,
            platform_share: 0,
            affiliate_share: 0,
            charity_share: 0,
        }
    }

    pub fn author_share(&self) -> u32 {
        self.author_share
    }

    pub fn platform_share(&self) -> u32 {
        self.platform_share
    }

    pub fn affiliate_share(&self) -> u32 {
        self.affiliate_share
    }

    pub fn charity_share(&self) -> u32 {
        self.charity_share
    }

    /// Split an amount in minor units; rounding remainders go to the author
    pub fn split(&self, amount: u64) -> [u64; 4] {
        // share <= 100, so every part fits back into u64
        let part = |share: u32| (u128::from(amount) * u128::from(share) / 100) as u64;
        let platform = part(self.platform_share);
        let affiliate = part(self.affiliate_share);
        let charity = part(self.charity_share);
        [amount - platform - affiliate - charity, platform, affiliate, charity]
    }
}

impl ValueObject for RevenueModel {
    fn validate(&self) -> Result<(), ValidationError> {
        let total = self
            .author_share
            .saturating_add(self.platform_share)
            .saturating_add(self.affiliate_share)
            .saturating_add(self.charity_share);
        if total != 100 {
            return Err(ValidationError::new(
                "revenueModel",
                format!("shares must total 100, got {}", total),
            ));
        }
        Ok(())
    }
}

impl Default for RevenueModel {
    fn default() -> Self {
        Self::author_only()
    }
}

// ============================================================================
// Usage terms
// ============================================================================

/// How often and until when a license may be used. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawUsageTerms")]
pub struct UsageTerms {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    commercial: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUsageTerms {
    limit: Option<u32>,
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    commercial: bool,
}

impl TryFrom<RawUsageTerms> for UsageTerms {
    type Error = ValidationError;

    fn try_from(raw: RawUsageTerms) -> Result<Self, Self::Error> {
        Self {
            limit: raw.limit,
            expires_at: raw.expires_at,
            commercial: raw.commercial,
        }
        .validated()
    }
}

impl UsageTerms {
    pub fn new(limit: Option<u32>, expires_at: Option<DateTime<Utc>>) -> Result<Self, ValidationError> {
        Self {
            limit,
            expires_at,
            commercial: false,
        }
        .validated()
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn commercial(mut self) -> Self {
        self.commercial = true;
        self
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_commercial(&self) -> bool {
        self.commercial
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| ExpirationPolicy::is_expired(expires_at, now))
    }
}

impl ValueObject for UsageTerms {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.limit == Some(0) {
            return Err(ValidationError::new("limit", "must allow at least one use"));
        }
        Ok(())
    }
}

// ============================================================================
// License
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseState {
    Issued,
    Acquired,
    Revoked,
}

impl fmt::Display for LicenseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LicenseState::Issued => "issued",
            LicenseState::Acquired => "acquired",
            LicenseState::Revoked => "revoked",
        };
        write!(f, "{}", s)
    }
}

/// Persisted shape of a license
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    pub id: ContentId,
    pub content_id: ContentId,
    pub owner_id: OwnerId,
    pub terms: UsageTerms,
    pub revenue_model: RevenueModel,
    pub state: LicenseState,
    pub usage_count: u32,
    pub issued_at: DateTime<Utc>,
    pub acquired_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct License {
    id: ContentId,
    content_id: ContentId,
    owner_id: OwnerId,
    terms: UsageTerms,
    revenue_model: RevenueModel,
    state: LicenseState,
    usage_count: u32,
    issued_at: DateTime<Utc>,
    acquired_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    events: EventBuffer,
}

impl License {
    /// Issue a license for `content_id` to `owner_id`; records `license.issued`
    pub fn issue(
        id: ContentId,
        content_id: ContentId,
        owner_id: OwnerId,
        terms: UsageTerms,
        revenue_model: RevenueModel,
    ) -> DomainResult<Self> {
        let now = Utc::now();
        if terms.is_expired_at(now) {
            return Err(ValidationError::new("expiresAt", "is already in the past").into());
        }

        let mut license = Self {
            id,
            content_id,
            owner_id,
            terms,
            revenue_model,
            state: LicenseState::Issued,
            usage_count: 0,
            issued_at: now,
            acquired_at: None,
            revoked_at: None,
            events: EventBuffer::new(CorrelationId::new()),
        };

        let payload = json!({
            "contentId": license.content_id,
            "ownerId": license.owner_id,
            "terms": license.terms,
            "revenueModel": license.revenue_model,
            "issuedAt": now,
        });
        license.record(EventAction::Issued, payload);
        Ok(license)
    }

    pub fn restore(record: LicenseRecord) -> DomainResult<Self> {
        let terms = record.terms.validated()?;
        let revenue_model = record.revenue_model.validated()?;
        if let Some(limit) = terms.limit() {
            if record.usage_count > limit {
                return Err(ValidationError::new(
                    "usageCount",
                    format!("{} exceeds the limit of {}", record.usage_count, limit),
                )
                .into());
            }
        }

        Ok(Self {
            id: record.id,
            content_id: record.content_id,
            owner_id: record.owner_id,
            terms,
            revenue_model,
            state: record.state,
            usage_count: record.usage_count,
            issued_at: record.issued_at,
            acquired_at: record.acquired_at,
            revoked_at: record.revoked_at,
            events: EventBuffer::new(CorrelationId::new()),
        })
    }

    pub fn snapshot(&self) -> LicenseRecord {
        LicenseRecord {
            id: self.id.clone(),
            content_id: self.content_id.clone(),
            owner_id: self.owner_id.clone(),
            terms: self.terms,
            revenue_model: self.revenue_model,
            state: self.state,
            usage_count: self.usage_count,
            issued_at: self.issued_at,
            acquired_at: self.acquired_at,
            revoked_at: self.revoked_at,
        }
    }

    fn record(&mut self, action: EventAction, payload: serde_json::Value) {
        let id = self.id.as_str().to_string();
        self.events
            .record(AggregateType::License, &id, action, payload);
    }

    fn reject(&self, reason: impl Into<String>) -> DomainError {
        DomainError::invalid_state(self.id.as_str(), reason)
    }

    fn expired(&self) -> DomainError {
        DomainError::ExpiredContent {
            aggregate_id: self.id.to_string(),
            expired_at: self.terms.expires_at().unwrap_or(self.issued_at),
        }
    }

    pub fn license_id(&self) -> &ContentId {
        &self.id
    }

    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn terms(&self) -> &UsageTerms {
        &self.terms
    }

    pub fn revenue_model(&self) -> &RevenueModel {
        &self.revenue_model
    }

    pub fn state(&self) -> LicenseState {
        self.state
    }

    pub fn usage_count(&self) -> u32 {
        self.usage_count
    }

    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        self.acquired_at
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Uses left before the limit; `None` when unlimited
    pub fn remaining_uses(&self) -> Option<u32> {
        self.terms
            .limit()
            .map(|limit| limit.saturating_sub(self.usage_count))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.terms.is_expired_at(now)
    }

    /// The holder accepts the license
    pub fn acquire(&mut self) -> DomainResult<()> {
        self.acquire_at(Utc::now())
    }

    pub fn acquire_at(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.state {
            LicenseState::Issued => {}
            LicenseState::Acquired => return Err(self.reject("already acquired")),
            LicenseState::Revoked => return Err(self.reject("license was revoked")),
        }
        if self.is_expired_at(now) {
            return Err(self.expired());
        }

        self.state = LicenseState::Acquired;
        self.acquired_at = Some(now);
        self.record(EventAction::Acquired, json!({ "acquiredAt": now }));
        Ok(())
    }

    /// Consume exactly one use
    pub fn record_use(&mut self) -> DomainResult<()> {
        self.record_use_at(Utc::now())
    }

    pub fn record_use_at(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.state != LicenseState::Acquired {
            return Err(self.reject(format!("license is {}, not acquired", self.state)));
        }
        if self.is_expired_at(now) {
            return Err(self.expired());
        }
        if self.remaining_uses() == Some(0) {
            return Err(self.reject("usage limit reached"));
        }

        self.usage_count += 1;
        let payload = json!({
            "usageCount": self.usage_count,
            "remainingUses": self.remaining_uses(),
            "usedAt": now,
        });
        self.record(EventAction::Used, payload);
        Ok(())
    }

    pub fn revoke(&mut self, reason: &str) -> DomainResult<()> {
        if self.state == LicenseState::Revoked {
            return Err(self.reject("already revoked"));
        }
        let now = Utc::now();
        self.state = LicenseState::Revoked;
        self.revoked_at = Some(now);
        self.record(
            EventAction::Revoked,
            json!({ "reason": reason, "revokedAt": now }),
        );
        Ok(())
    }
}

impl Aggregate for License {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn aggregate_type(&self) -> AggregateType {
        AggregateType::License
    }

    fn events(&self) -> &EventBuffer {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventBuffer {
        &mut self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn license(terms: UsageTerms) -> License {
        let mut license = License::issue(
            ContentId::new("lic-1").unwrap(),
            ContentId::new("CxYz123AbC").unwrap(),
            OwnerId::new("studio-9").unwrap(),
            terms,
            RevenueModel::new(70, 20, 5, 5).unwrap(),
        )
        .unwrap();
        license.pull_domain_events();
        license
    }

    #[test]
    fn test_revenue_shares_must_total_100() {
        assert!(RevenueModel::new(70, 20, 5, 5).is_ok());

        let under = RevenueModel::new(70, 20, 5, 4).unwrap_err();
        assert_eq!(under.field, "revenueModel");
        assert!(RevenueModel::new(70, 20, 5, 6).is_err());
    }

    #[test]
    fn test_revenue_model_deserialize_validates() {
        let ok: RevenueModel =
            serde_json::from_str(r#"{"authorShare":80,"platformShare":20}"#).unwrap();
        assert_eq!(ok.author_share(), 80);

        let bad = serde_json::from_str::<RevenueModel>(r#"{"authorShare":80,"platformShare":21}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_split_gives_remainder_to_author() {
        let model = RevenueModel::new(70, 20, 5, 5).unwrap();
        assert_eq!(model.split(999), [702, 199, 49, 49]);
        assert_eq!(model.split(999).iter().sum::<u64>(), 999);

        let large = model.split(u64::MAX);
        assert_eq!(large.iter().map(|&p| u128::from(p)).sum::<u128>(), u128::from(u64::MAX));
        assert_eq!(large[1], (u128::from(u64::MAX) * 20 / 100) as u64);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = UsageTerms::new(Some(0), None).unwrap_err();
        assert_eq!(err.field, "limit");
    }

    #[test]
    fn test_use_requires_acquire() {
        let mut license = license(UsageTerms::unlimited());
        let err = license.record_use().unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(license.usage_count(), 0);
        assert!(license.pull_domain_events().is_empty());
    }

    #[test]
    fn test_use_until_limit() {
        let mut license = license(UsageTerms::new(Some(2), None).unwrap());
        license.acquire().unwrap();
        license.record_use().unwrap();
        license.record_use().unwrap();
        assert_eq!(license.remaining_uses(), Some(0));

        let err = license.record_use().unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
        assert_eq!(license.usage_count(), 2);

        let kinds: Vec<String> = license
            .pull_domain_events()
            .iter()
            .map(|e| e.event_kind().to_string())
            .collect();
        assert_eq!(kinds, vec!["license.acquired", "license.used", "license.used"]);
    }

    #[test]
    fn test_use_after_expiry() {
        let expires_at = Utc::now() + Duration::hours(1);
        let mut license = license(UsageTerms::new(None, Some(expires_at)).unwrap());
        license.acquire().unwrap();

        let err = license
            .record_use_at(expires_at + Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, DomainError::ExpiredContent { .. }));
        assert!(license.is_expired_at(expires_at + Duration::seconds(1)));
        assert!(!license.is_expired_at(expires_at));
    }

    #[test]
    fn test_revoked_license_cannot_be_used() {
        let mut license = license(UsageTerms::unlimited());
        license.acquire().unwrap();
        license.revoke("chargeback").unwrap();

        assert!(license.record_use().is_err());
        assert!(license.revoke("again").is_err());
        assert_eq!(license.state(), LicenseState::Revoked);
    }

    #[test]
    fn test_issue_in_past_rejected() {
        let terms = UsageTerms::new(None, Some(Utc::now() - Duration::days(1))).unwrap();
        let err = License::issue(
            ContentId::new("lic-2").unwrap(),
            ContentId::new("x").unwrap(),
            OwnerId::new("y").unwrap(),
            terms,
            RevenueModel::default(),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("expiresAt"));
    }

    #[test]
    fn test_record_round_trip() {
        let mut license = license(UsageTerms::new(Some(5), None).unwrap().commercial());
        license.acquire().unwrap();
        license.record_use().unwrap();

        let json = serde_json::to_string(&license.snapshot()).unwrap();
        let record: LicenseRecord = serde_json::from_str(&json).unwrap();
        let restored = License::restore(record).unwrap();

        assert_eq!(restored.snapshot(), license.snapshot());
        assert_eq!(restored.remaining_uses(), Some(4));
        assert!(restored.terms().is_commercial());
    }
}
