//! Policy-set endpoint family and cache invalidation.
//!
//! Every mutation follows the same sequence: encode, send, check status,
//! invalidate the affected keys, then decode the returned entity if there is
//! one. Any 2xx is an accepted mutation: the entity is optional, and a body
//! that is empty or does not parse is logged and reported as `None`. A failed
//! request invalidates nothing.
//!
//! Reads capture the cache epoch before fetching. An invalidation that lands
//! while the fetch is in flight bumps the epoch, and the fetched value is
//! returned to the caller without being cached.
//!
//! | Mutation          | Invalidated keys            |
//! |-------------------|-----------------------------|
//! | create set        | list                        |
//! | add policy        | list, set                   |
//! | replace policy    | list, set, policy           |
//! | delete policy     | list, set, policy           |
//! | delete set        | list, set                   |

use std::fmt::{self, Display};

use serde_json::Value;
use tracing::{debug, info, warn};
use warden_abac::wire::{self, Entity, parse_policy_set, parse_policy_sets, parse_stored_policy};
use warden_abac::{
    ParseError, Policy, PolicyId, PolicySet, PolicySetId, StoredPolicy, StoredPolicySet,
};

use crate::cache::{CacheKey, CachedRead, ReadCache};
use crate::error::{Result, SyncError};
use crate::transport::{Method, Request, Response, Transport};

// ============================================================================
// Scope and filters
// ============================================================================

/// Which endpoint family a gateway talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Policy sets the caller is party to (`/policy-set`).
    #[default]
    Member,
    /// All policy sets, admin authorization (`/admin/policy-set`).
    Admin,
}

impl Scope {
    pub fn from_admin(admin: bool) -> Self {
        if admin { Self::Admin } else { Self::Member }
    }

    fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Member => None,
            Self::Admin => Some("admin"),
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member => write!(f, "member"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Optional narrowing of the policy-set list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListFilter {
    pub access_subject: Option<String>,
    pub policy_issuer: Option<String>,
}

impl ListFilter {
    pub fn is_empty(&self) -> bool {
        self.query().is_empty()
    }

    /// Query pairs in registry order. Empty values are omitted.
    pub fn query(&self) -> Vec<(String, String)> {
        [
            ("access_subject", &self.access_subject),
            ("policy_issuer", &self.policy_issuer),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
    }

    // Empty values and `None` address the same list.
    fn normalized(&self) -> Self {
        let keep = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        Self {
            access_subject: keep(&self.access_subject),
            policy_issuer: keep(&self.policy_issuer),
        }
    }
}

// ============================================================================
// Gateway
// ============================================================================

const POLICY_SET: &str = "policy-set";
const POLICY: &str = "policy";

/// Registry client for one endpoint family.
#[derive(Debug)]
pub struct Gateway<T, C> {
    transport: T,
    cache: C,
    scope: Scope,
}

impl<T: Transport, C: ReadCache> Gateway<T, C> {
    pub fn new(transport: T, cache: C, scope: Scope) -> Self {
        Self {
            transport,
            cache,
            scope,
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Lists policy sets, optionally filtered by subject and issuer.
    pub async fn list_policy_sets(&self, filter: &ListFilter) -> Result<Vec<StoredPolicySet>> {
        let filter = filter.normalized();
        let key = CacheKey::PolicySets {
            scope: self.scope,
            filter: filter.clone(),
        };
        if let Some(CachedRead::PolicySets(sets)) = self.cache.get(&key) {
            debug!(key = %key, "cache hit");
            return Ok(sets);
        }

        let epoch = self.cache.epoch();
        let request = self
            .request(Method::Get, &[POLICY_SET])
            .with_query(filter.query());
        let (endpoint, response) = self.execute(request).await?;
        let sets = self.parse_with(&endpoint, &response, Entity::PolicySetList, parse_policy_sets)?;

        self.store(key, CachedRead::PolicySets(sets.clone()), epoch);
        Ok(sets)
    }

    pub async fn get_policy_set(&self, id: &PolicySetId) -> Result<StoredPolicySet> {
        let key = CacheKey::policy_set(self.scope, id);
        if let Some(CachedRead::PolicySet(set)) = self.cache.get(&key) {
            debug!(key = %key, "cache hit");
            return Ok(set);
        }

        let epoch = self.cache.epoch();
        let request = self.request(Method::Get, &[POLICY_SET, id.as_str()]);
        let (endpoint, response) = self.execute(request).await?;
        let set = self.parse_with(&endpoint, &response, Entity::PolicySet, parse_policy_set)?;

        self.store(key, CachedRead::PolicySet(set.clone()), epoch);
        Ok(set)
    }

    pub async fn get_policy(
        &self,
        policy_set_id: &PolicySetId,
        policy_id: &PolicyId,
    ) -> Result<StoredPolicy> {
        let key = CacheKey::policy(self.scope, policy_set_id, policy_id);
        if let Some(CachedRead::Policy(policy)) = self.cache.get(&key) {
            debug!(key = %key, "cache hit");
            return Ok(policy);
        }

        let epoch = self.cache.epoch();
        let request = self.request(
            Method::Get,
            &[POLICY_SET, policy_set_id.as_str(), POLICY, policy_id.as_str()],
        );
        let (endpoint, response) = self.execute(request).await?;
        let policy =
            self.parse_with(&endpoint, &response, Entity::StoredPolicy, parse_stored_policy)?;

        self.store(key, CachedRead::Policy(policy.clone()), epoch);
        Ok(policy)
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Creates a policy set. Returns the stored set when the registry echoes
    /// it back.
    pub async fn create_policy_set(&self, set: &PolicySet) -> Result<Option<StoredPolicySet>> {
        let body = encode(&wire::compile_policy_set(set))?;
        let request = self.request(Method::Post, &[POLICY_SET]).with_body(body);
        let (endpoint, response) = self.execute(request).await?;

        self.invalidate(&[CacheKey::policy_sets(self.scope)]);

        let stored = self.accepted(&endpoint, &response, Entity::PolicySet, parse_policy_set);
        info!(
            scope = %self.scope,
            policy_set_id = stored.as_ref().map(|s| s.id.as_str()),
            policies = set.policies.len(),
            "policy set created"
        );
        Ok(stored)
    }

    pub async fn add_policy(
        &self,
        policy_set_id: &PolicySetId,
        policy: &Policy,
    ) -> Result<Option<StoredPolicy>> {
        let body = encode(&wire::compile(policy))?;
        let request = self
            .request(Method::Post, &[POLICY_SET, policy_set_id.as_str(), POLICY])
            .with_body(body);
        let (endpoint, response) = self.execute(request).await?;

        self.invalidate(&[
            CacheKey::policy_sets(self.scope),
            CacheKey::policy_set(self.scope, policy_set_id),
        ]);

        let stored = self.accepted(&endpoint, &response, Entity::StoredPolicy, parse_stored_policy);
        info!(
            scope = %self.scope,
            policy_set_id = %policy_set_id,
            policy_id = stored.as_ref().map(|s| s.id.as_str()),
            exceptions = policy.exception_count(),
            "policy added"
        );
        Ok(stored)
    }

    pub async fn replace_policy(
        &self,
        policy_set_id: &PolicySetId,
        policy_id: &PolicyId,
        policy: &Policy,
    ) -> Result<Option<StoredPolicy>> {
        let body = encode(&wire::compile(policy))?;
        let request = self
            .request(
                Method::Put,
                &[POLICY_SET, policy_set_id.as_str(), POLICY, policy_id.as_str()],
            )
            .with_body(body);
        let (endpoint, response) = self.execute(request).await?;

        self.invalidate(&[
            CacheKey::policy_sets(self.scope),
            CacheKey::policy_set(self.scope, policy_set_id),
            CacheKey::policy(self.scope, policy_set_id, policy_id),
        ]);

        let stored = self.accepted(&endpoint, &response, Entity::StoredPolicy, parse_stored_policy);
        info!(
            scope = %self.scope,
            policy_set_id = %policy_set_id,
            policy_id = %policy_id,
            "policy replaced"
        );
        Ok(stored)
    }

    pub async fn delete_policy(
        &self,
        policy_set_id: &PolicySetId,
        policy_id: &PolicyId,
    ) -> Result<()> {
        let request = self.request(
            Method::Delete,
            &[POLICY_SET, policy_set_id.as_str(), POLICY, policy_id.as_str()],
        );
        self.execute(request).await?;

        self.invalidate(&[
            CacheKey::policy_sets(self.scope),
            CacheKey::policy_set(self.scope, policy_set_id),
            CacheKey::policy(self.scope, policy_set_id, policy_id),
        ]);

        info!(
            scope = %self.scope,
            policy_set_id = %policy_set_id,
            policy_id = %policy_id,
            "policy deleted"
        );
        Ok(())
    }

    pub async fn delete_policy_set(&self, policy_set_id: &PolicySetId) -> Result<()> {
        let request = self.request(Method::Delete, &[POLICY_SET, policy_set_id.as_str()]);
        self.execute(request).await?;

        self.invalidate(&[
            CacheKey::policy_sets(self.scope),
            CacheKey::policy_set(self.scope, policy_set_id),
        ]);

        info!(scope = %self.scope, policy_set_id = %policy_set_id, "policy set deleted");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn request(&self, method: Method, segments: &[&str]) -> Request {
        let mut path: Vec<&str> = self.scope.prefix().into_iter().collect();
        path.extend_from_slice(segments);
        Request::new(method, path)
    }

    /// Sends `request` and maps non-2xx statuses to [`SyncError::Status`].
    async fn execute(&self, request: Request) -> Result<(String, Response)> {
        request.check_segments()?;
        let endpoint = request.path();
        let method = request.method;
        debug!(method = %method, endpoint = %endpoint, "registry request");

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            warn!(
                method = %method,
                endpoint = %endpoint,
                status = response.status,
                "registry rejected request"
            );
            return Err(SyncError::Status {
                endpoint,
                status: response.status,
                body: response.body,
            });
        }

        Ok((endpoint, response))
    }

    fn parse_with<R>(
        &self,
        endpoint: &str,
        response: &Response,
        entity: Entity,
        parse: impl FnOnce(Value) -> std::result::Result<R, ParseError>,
    ) -> Result<R> {
        let parsed = serde_json::from_str::<Value>(&response.body)
            .map_err(|source| ParseError::Shape { entity, source })
            .and_then(parse);

        parsed.map_err(|source| {
            warn!(
                scope = %self.scope,
                endpoint = %endpoint,
                error = %source,
                "registry response did not match the expected shape"
            );
            SyncError::Parse {
                endpoint: endpoint.to_string(),
                source,
            }
        })
    }

    /// Decodes the entity echoed by an accepted mutation, if there is one.
    fn accepted<R>(
        &self,
        endpoint: &str,
        response: &Response,
        entity: Entity,
        parse: impl FnOnce(Value) -> std::result::Result<R, ParseError>,
    ) -> Option<R> {
        if response.body.trim().is_empty() {
            debug!(
                endpoint = %endpoint,
                status = response.status,
                "mutation accepted without a body"
            );
            return None;
        }
        self.parse_with(endpoint, response, entity, parse).ok()
    }

    fn store(&self, key: CacheKey, value: CachedRead, epoch: u64) {
        if !self.cache.insert(key.clone(), value, epoch) {
            debug!(key = %key, epoch, "invalidated while in flight; not cached");
        }
    }

    fn invalidate(&self, keys: &[CacheKey]) {
        for key in keys {
            let removed = self.cache.invalidate(key);
            debug!(key = %key, removed, "cache invalidated");
        }
    }
}

fn encode<S: serde::Serialize>(payload: &S) -> Result<Value> {
    serde_json::to_value(payload).map_err(SyncError::Encode)
}
