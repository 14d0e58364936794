//! In-memory fakes of the control-plane APIs
//!
//! [`MockLoadBalancer`] behaves like the service closely enough for rotation
//! tests: mutations return work requests that advance through a scripted
//! state sequence, one step per poll, and take effect when they reach
//! `SUCCEEDED`. Every call is journaled in order.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::api::{DnsApi, LoadBalancerApi, ObjectStorageApi};
use crate::error::{CloudError, CloudResult};
use crate::model::{
    Bucket, CertificateSummary, Listener, ListenerUpdate, LoadBalancer, NewBucket, NewCertificate,
    PublicAccessType, RecordOperation, RecordOperationKind, SslConfiguration, WorkRequest,
    WorkRequestErrorDetail, WorkRequestId, WorkRequestState,
};

/// HTTPS listener fixture
pub fn https_listener(
    name: &str,
    port: u16,
    backend_set: &str,
    certificate: Option<&str>,
) -> Listener {
    Listener {
        name: name.to_owned(),
        default_backend_set_name: backend_set.to_owned(),
        port,
        protocol: "HTTP".to_owned(),
        ssl_configuration: certificate.map(|c| SslConfiguration {
            certificate_name: Some(c.to_owned()),
            verify_peer_certificate: Some(false),
            verify_depth: Some(1),
            ..SslConfiguration::default()
        }),
        hostname_names: Vec::new(),
        path_route_set_name: None,
        routing_policy_name: None,
        rule_set_names: Vec::new(),
        connection_configuration: None,
    }
}

/// Load balancer API operation, for failure injection and journal queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// `create_certificate`
    CreateCertificate,
    /// `get_work_request`
    GetWorkRequest,
    /// `get_load_balancer`
    GetLoadBalancer,
    /// `update_listener`
    UpdateListener,
    /// `delete_certificate`
    DeleteCertificate,
}

impl MockOperation {
    fn name(self) -> &'static str {
        match self {
            Self::CreateCertificate => "create_certificate",
            Self::GetWorkRequest => "get_work_request",
            Self::GetLoadBalancer => "get_load_balancer",
            Self::UpdateListener => "update_listener",
            Self::DeleteCertificate => "delete_certificate",
        }
    }
}

/// Mutation whose work request lifecycle can be scripted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MockTarget {
    /// Creation of the named certificate
    CreateCertificate(String),
    /// Update of the named listener
    UpdateListener(String),
    /// Deletion of the named certificate
    DeleteCertificate(String),
}

/// One journaled call
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `create_certificate`
    CreateCertificate {
        /// Load balancer id
        load_balancer: String,
        /// Certificate name
        certificate: String,
        /// Certificate chain
        chain: String,
        /// Work request, when accepted
        work_request: Option<WorkRequestId>,
    },
    /// `get_work_request`
    GetWorkRequest {
        /// Work request id
        work_request: WorkRequestId,
        /// Reported state, when found
        state: Option<WorkRequestState>,
    },
    /// `get_load_balancer`
    GetLoadBalancer {
        /// Load balancer id
        load_balancer: String,
    },
    /// `update_listener`
    UpdateListener {
        /// Load balancer id
        load_balancer: String,
        /// Listener name
        listener: String,
        /// Submitted definition
        update: ListenerUpdate,
        /// Work request, when accepted
        work_request: Option<WorkRequestId>,
    },
    /// `delete_certificate`
    DeleteCertificate {
        /// Load balancer id
        load_balancer: String,
        /// Certificate name
        certificate: String,
        /// Work request, when accepted
        work_request: Option<WorkRequestId>,
    },
}

impl MockCall {
    /// Operation this call invoked
    pub fn operation(&self) -> MockOperation {
        match self {
            Self::CreateCertificate { .. } => MockOperation::CreateCertificate,
            Self::GetWorkRequest { .. } => MockOperation::GetWorkRequest,
            Self::GetLoadBalancer { .. } => MockOperation::GetLoadBalancer,
            Self::UpdateListener { .. } => MockOperation::UpdateListener,
            Self::DeleteCertificate { .. } => MockOperation::DeleteCertificate,
        }
    }

    /// Work request started by this call, or polled by it
    pub fn work_request(&self) -> Option<&WorkRequestId> {
        match self {
            Self::CreateCertificate { work_request, .. }
            | Self::UpdateListener { work_request, .. }
            | Self::DeleteCertificate { work_request, .. } => work_request.as_ref(),
            Self::GetWorkRequest { work_request, .. } => Some(work_request),
            Self::GetLoadBalancer { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Effect {
    Create {
        load_balancer: String,
        certificate: CertificateSummary,
    },
    Update {
        load_balancer: String,
        listener: String,
        update: ListenerUpdate,
    },
    Delete {
        load_balancer: String,
        certificate: String,
    },
}

#[derive(Debug)]
struct PendingWork {
    load_balancer: String,
    operation_type: &'static str,
    states: VecDeque<WorkRequestState>,
    effect: Option<Effect>,
    failure: Option<String>,
}

#[derive(Debug)]
struct Injected {
    status: u16,
    code: String,
}

#[derive(Debug)]
struct LbState {
    load_balancers: BTreeMap<String, LoadBalancer>,
    work: HashMap<WorkRequestId, PendingWork>,
    scripts: HashMap<MockTarget, Vec<WorkRequestState>>,
    failures: HashMap<(MockOperation, Option<String>), Injected>,
    default_lifecycle: Vec<WorkRequestState>,
    next_id: u64,
    journal: Vec<MockCall>,
}

/// In-memory [`LoadBalancerApi`]
#[derive(Debug)]
pub struct MockLoadBalancer {
    state: Mutex<LbState>,
}

impl Default for MockLoadBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLoadBalancer {
    /// Empty fake; work requests go `ACCEPTED → IN_PROGRESS → SUCCEEDED`
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LbState {
                load_balancers: BTreeMap::new(),
                work: HashMap::new(),
                scripts: HashMap::new(),
                failures: HashMap::new(),
                default_lifecycle: vec![
                    WorkRequestState::Accepted,
                    WorkRequestState::InProgress,
                    WorkRequestState::Succeeded,
                ],
                next_id: 0,
                journal: Vec::new(),
            }),
        }
    }

    /// Add an empty load balancer
    pub fn with_load_balancer(self, id: &str) -> Self {
        self.state.lock().load_balancers.insert(
            id.to_owned(),
            LoadBalancer {
                id: id.to_owned(),
                display_name: None,
                listeners: BTreeMap::new(),
                certificates: BTreeMap::new(),
            },
        );
        self
    }

    /// Add a certificate to an existing load balancer
    pub fn with_certificate(self, load_balancer: &str, name: &str) -> Self {
        if let Some(lb) = self.state.lock().load_balancers.get_mut(load_balancer) {
            lb.certificates.insert(
                name.to_owned(),
                CertificateSummary {
                    certificate_name: name.to_owned(),
                    public_certificate: None,
                    ca_certificate: None,
                },
            );
        }
        self
    }

    /// Add a listener to an existing load balancer
    pub fn with_listener(self, load_balancer: &str, listener: Listener) -> Self {
        if let Some(lb) = self.state.lock().load_balancers.get_mut(load_balancer) {
            lb.listeners.insert(listener.name.clone(), listener);
        }
        self
    }

    /// State sequence for work requests without a script
    pub fn with_default_lifecycle(
        self,
        states: impl IntoIterator<Item = WorkRequestState>,
    ) -> Self {
        self.state.lock().default_lifecycle = states.into_iter().collect();
        self
    }

    /// States reported, one per poll, by the work request of `target`
    ///
    /// The last state repeats once the sequence is exhausted.
    pub fn script(&self, target: MockTarget, states: impl IntoIterator<Item = WorkRequestState>) {
        self.state
            .lock()
            .scripts
            .insert(target, states.into_iter().collect());
    }

    /// Make every call of `operation` fail with `status`
    pub fn fail_call(&self, operation: MockOperation, status: u16) {
        self.inject(operation, None, status);
    }

    /// Make calls of `operation` naming `target` fail with `status`
    ///
    /// `target` is the certificate or listener name the call addresses.
    pub fn fail_call_for(&self, operation: MockOperation, target: &str, status: u16) {
        self.inject(operation, Some(target.to_owned()), status);
    }

    fn inject(&self, operation: MockOperation, target: Option<String>, status: u16) {
        let code = match status {
            404 => "NotAuthorizedOrNotFound",
            409 => "Conflict",
            429 => "TooManyRequests",
            s if s >= 500 => "InternalServerError",
            _ => "InvalidParameter",
        };
        self.state.lock().failures.insert(
            (operation, target),
            Injected {
                status,
                code: code.to_owned(),
            },
        );
    }

    /// Journal of every call, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().journal.clone()
    }

    /// Number of calls of `operation`
    pub fn count(&self, operation: MockOperation) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Current state of a load balancer
    pub fn snapshot(&self, load_balancer: &str) -> Option<LoadBalancer> {
        self.state.lock().load_balancers.get(load_balancer).cloned()
    }

    /// Certificate names currently stored on a load balancer
    pub fn certificate_names(&self, load_balancer: &str) -> Vec<String> {
        self.snapshot(load_balancer)
            .map(|lb| lb.certificates.into_keys().collect())
            .unwrap_or_default()
    }

    /// Certificate a listener currently serves
    pub fn bound_certificate(&self, load_balancer: &str, listener: &str) -> Option<String> {
        self.snapshot(load_balancer)?
            .listener(listener)?
            .certificate_name()
            .map(str::to_owned)
    }
}

impl LbState {
    fn injected(&self, operation: MockOperation, target: Option<&str>) -> Option<CloudError> {
        let found = target
            .and_then(|t| self.failures.get(&(operation, Some(t.to_owned()))))
            .or_else(|| self.failures.get(&(operation, None)))?;
        Some(CloudError::status(
            operation.name(),
            found.status,
            found.code.clone(),
            "injected failure",
        ))
    }

    fn load_balancer(&self, operation: MockOperation, id: &str) -> CloudResult<&LoadBalancer> {
        self.load_balancers
            .get(id)
            .ok_or_else(|| CloudError::not_found(operation.name(), format!("load balancer {id} not found")))
    }

    fn submit(
        &mut self,
        target: MockTarget,
        load_balancer: &str,
        operation_type: &'static str,
        effect: Effect,
    ) -> WorkRequestId {
        self.next_id += 1;
        let id = WorkRequestId::new(format!(
            "ocid1.loadbalancerworkrequest.oc1..mock{:04}",
            self.next_id
        ));
        let states = self
            .scripts
            .get(&target)
            .unwrap_or(&self.default_lifecycle)
            .iter()
            .copied()
            .collect();
        self.work.insert(
            id.clone(),
            PendingWork {
                load_balancer: load_balancer.to_owned(),
                operation_type,
                states,
                effect: Some(effect),
                failure: None,
            },
        );
        id
    }

    fn create_certificate(
        &mut self,
        load_balancer_id: &str,
        certificate: &NewCertificate,
    ) -> CloudResult<WorkRequestId> {
        let name = &certificate.certificate_name;
        if let Some(err) = self.injected(MockOperation::CreateCertificate, Some(name.as_str())) {
            return Err(err);
        }
        let lb = self.load_balancer(MockOperation::CreateCertificate, load_balancer_id)?;
        if lb.certificates.contains_key(name) {
            return Err(CloudError::status(
                "create_certificate",
                409,
                "Conflict",
                format!("certificate {name} already exists"),
            ));
        }
        let effect = Effect::Create {
            load_balancer: load_balancer_id.to_owned(),
            certificate: CertificateSummary {
                certificate_name: name.clone(),
                public_certificate: Some(certificate.public_certificate.clone()),
                ca_certificate: None,
            },
        };
        Ok(self.submit(
            MockTarget::CreateCertificate(name.clone()),
            load_balancer_id,
            "CreateCertificate",
            effect,
        ))
    }

    fn update_listener(
        &mut self,
        load_balancer_id: &str,
        listener_name: &str,
        update: &ListenerUpdate,
    ) -> CloudResult<WorkRequestId> {
        if let Some(err) = self.injected(MockOperation::UpdateListener, Some(listener_name)) {
            return Err(err);
        }
        let lb = self.load_balancer(MockOperation::UpdateListener, load_balancer_id)?;
        if lb.listener(listener_name).is_none() {
            return Err(CloudError::not_found(
                "update_listener",
                format!("listener {listener_name} not found"),
            ));
        }
        let effect = Effect::Update {
            load_balancer: load_balancer_id.to_owned(),
            listener: listener_name.to_owned(),
            update: update.clone(),
        };
        Ok(self.submit(
            MockTarget::UpdateListener(listener_name.to_owned()),
            load_balancer_id,
            "UpdateListener",
            effect,
        ))
    }

    fn delete_certificate(
        &mut self,
        load_balancer_id: &str,
        certificate_name: &str,
    ) -> CloudResult<WorkRequestId> {
        if let Some(err) = self.injected(MockOperation::DeleteCertificate, Some(certificate_name)) {
            return Err(err);
        }
        let lb = self.load_balancer(MockOperation::DeleteCertificate, load_balancer_id)?;
        if !lb.certificates.contains_key(certificate_name) {
            return Err(CloudError::not_found(
                "delete_certificate",
                format!("certificate {certificate_name} not found"),
            ));
        }
        let effect = Effect::Delete {
            load_balancer: load_balancer_id.to_owned(),
            certificate: certificate_name.to_owned(),
        };
        Ok(self.submit(
            MockTarget::DeleteCertificate(certificate_name.to_owned()),
            load_balancer_id,
            "DeleteCertificate",
            effect,
        ))
    }

    fn apply(&mut self, effect: Effect) -> Result<(), String> {
        match effect {
            Effect::Create {
                load_balancer,
                certificate,
            } => {
                let lb = self
                    .load_balancers
                    .get_mut(&load_balancer)
                    .ok_or("load balancer vanished")?;
                lb.certificates
                    .insert(certificate.certificate_name.clone(), certificate);
            }
            Effect::Update {
                load_balancer,
                listener,
                update,
            } => {
                let lb = self
                    .load_balancers
                    .get_mut(&load_balancer)
                    .ok_or("load balancer vanished")?;
                if let Some(name) = update.certificate_name()
                    && !lb.certificates.contains_key(name)
                {
                    return Err(format!("certificate {name} does not exist"));
                }
                let target = lb
                    .listeners
                    .get_mut(&listener)
                    .ok_or_else(|| format!("listener {listener} does not exist"))?;
                update.apply_to(target);
            }
            Effect::Delete {
                load_balancer,
                certificate,
            } => {
                let lb = self
                    .load_balancers
                    .get_mut(&load_balancer)
                    .ok_or("load balancer vanished")?;
                if let Some(user) = lb
                    .listeners
                    .values()
                    .find(|l| l.certificate_name() == Some(certificate.as_str()))
                {
                    return Err(format!(
                        "certificate {certificate} is in use by listener {}",
                        user.name
                    ));
                }
                lb.certificates.remove(&certificate);
            }
        }
        Ok(())
    }

    fn poll(&mut self, id: &WorkRequestId) -> CloudResult<WorkRequest> {
        let work = self.work.get_mut(id).ok_or_else(|| {
            CloudError::not_found("get_work_request", format!("work request {id} not found"))
        })?;

        let mut state = if work.states.len() > 1 {
            work.states.pop_front()
        } else {
            work.states.front().copied()
        }
        .unwrap_or(WorkRequestState::Succeeded);

        if state == WorkRequestState::Succeeded
            && let Some(effect) = work.effect.take()
            && let Err(reason) = self.apply(effect)
        {
            if let Some(work) = self.work.get_mut(id) {
                work.states = VecDeque::from([WorkRequestState::Failed]);
                work.failure = Some(reason);
            }
            state = WorkRequestState::Failed;
        }

        let work = self.work.get(id).ok_or_else(|| {
            CloudError::not_found("get_work_request", format!("work request {id} not found"))
        })?;
        let error_details = match (&work.failure, state) {
            (Some(reason), WorkRequestState::Failed) => vec![WorkRequestErrorDetail {
                error_code: Some("INVALID_STATE".into()),
                message: Some(reason.clone()),
            }],
            _ => Vec::new(),
        };
        Ok(WorkRequest {
            id: id.clone(),
            state,
            load_balancer_id: Some(work.load_balancer.clone()),
            operation_type: Some(work.operation_type.to_owned()),
            message: None,
            error_details,
        })
    }
}

#[async_trait]
impl LoadBalancerApi for MockLoadBalancer {
    async fn create_certificate(
        &self,
        load_balancer_id: &str,
        certificate: &NewCertificate,
    ) -> CloudResult<WorkRequestId> {
        let mut state = self.state.lock();
        let result = state.create_certificate(load_balancer_id, certificate);
        state.journal.push(MockCall::CreateCertificate {
            load_balancer: load_balancer_id.to_owned(),
            certificate: certificate.certificate_name.clone(),
            chain: certificate.public_certificate.clone(),
            work_request: result.as_ref().ok().cloned(),
        });
        result
    }

    async fn get_work_request(&self, id: &WorkRequestId) -> CloudResult<WorkRequest> {
        let mut state = self.state.lock();
        let result = match state.injected(MockOperation::GetWorkRequest, Some(id.as_str())) {
            Some(err) => Err(err),
            None => state.poll(id),
        };
        state.journal.push(MockCall::GetWorkRequest {
            work_request: id.clone(),
            state: result.as_ref().ok().map(|wr| wr.state),
        });
        result
    }

    async fn get_load_balancer(&self, load_balancer_id: &str) -> CloudResult<LoadBalancer> {
        let mut state = self.state.lock();
        let result = match state.injected(MockOperation::GetLoadBalancer, Some(load_balancer_id)) {
            Some(err) => Err(err),
            None => state
                .load_balancer(MockOperation::GetLoadBalancer, load_balancer_id)
                .cloned(),
        };
        state.journal.push(MockCall::GetLoadBalancer {
            load_balancer: load_balancer_id.to_owned(),
        });
        result
    }

    async fn update_listener(
        &self,
        load_balancer_id: &str,
        listener_name: &str,
        update: &ListenerUpdate,
    ) -> CloudResult<WorkRequestId> {
        let mut state = self.state.lock();
        let result = state.update_listener(load_balancer_id, listener_name, update);
        state.journal.push(MockCall::UpdateListener {
            load_balancer: load_balancer_id.to_owned(),
            listener: listener_name.to_owned(),
            update: update.clone(),
            work_request: result.as_ref().ok().cloned(),
        });
        result
    }

    async fn delete_certificate(
        &self,
        load_balancer_id: &str,
        certificate_name: &str,
    ) -> CloudResult<WorkRequestId> {
        let mut state = self.state.lock();
        let result = state.delete_certificate(load_balancer_id, certificate_name);
        state.journal.push(MockCall::DeleteCertificate {
            load_balancer: load_balancer_id.to_owned(),
            certificate: certificate_name.to_owned(),
            work_request: result.as_ref().ok().cloned(),
        });
        result
    }
}

/// Object storage call, as journaled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    /// `get_bucket`
    GetBucket {
        /// Namespace
        namespace: String,
        /// Bucket
        bucket: String,
    },
    /// `create_bucket`
    CreateBucket {
        /// Namespace
        namespace: String,
        /// Requested bucket
        bucket: NewBucket,
    },
    /// `put_object`
    PutObject {
        /// Namespace
        namespace: String,
        /// Bucket
        bucket: String,
        /// Object name
        object: String,
    },
}

#[derive(Debug, Default)]
struct StorageState {
    buckets: BTreeMap<(String, String), Bucket>,
    objects: BTreeMap<(String, String, String), Vec<u8>>,
    failures: HashMap<&'static str, u16>,
    journal: Vec<StorageCall>,
}

/// In-memory [`ObjectStorageApi`]
#[derive(Debug, Default)]
pub struct MockObjectStorage {
    state: Mutex<StorageState>,
}

impl MockObjectStorage {
    /// Empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-existing private bucket
    pub fn with_bucket(self, namespace: &str, bucket: &str) -> Self {
        self.state.lock().buckets.insert(
            (namespace.to_owned(), bucket.to_owned()),
            Bucket {
                name: bucket.to_owned(),
                namespace: namespace.to_owned(),
                compartment_id: String::new(),
                public_access_type: PublicAccessType::NoPublicAccess,
            },
        );
        self
    }

    /// Make every call of `operation` (`get_bucket`, `create_bucket`,
    /// `put_object`) fail with `status`
    pub fn fail_call(&self, operation: &'static str, status: u16) {
        self.state.lock().failures.insert(operation, status);
    }

    /// Journal of every call, in order
    pub fn calls(&self) -> Vec<StorageCall> {
        self.state.lock().journal.clone()
    }

    /// Whether the bucket exists
    pub fn has_bucket(&self, namespace: &str, bucket: &str) -> bool {
        self.state
            .lock()
            .buckets
            .contains_key(&(namespace.to_owned(), bucket.to_owned()))
    }

    /// Stored object body
    pub fn object(&self, namespace: &str, bucket: &str, object: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .objects
            .get(&(namespace.to_owned(), bucket.to_owned(), object.to_owned()))
            .cloned()
    }

    /// Names of the objects in a bucket
    pub fn object_names(&self, namespace: &str, bucket: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .objects
            .keys()
            .filter(|(ns, b, _)| ns == namespace && b == bucket)
            .map(|(_, _, o)| o.clone())
            .collect()
    }
}

impl StorageState {
    fn injected(&self, operation: &'static str) -> Option<CloudError> {
        self.failures
            .get(operation)
            .map(|status| CloudError::status(operation, *status, "InjectedFailure", "injected failure"))
    }
}

#[async_trait]
impl ObjectStorageApi for MockObjectStorage {
    async fn get_bucket(&self, namespace: &str, bucket: &str) -> CloudResult<Bucket> {
        let mut state = self.state.lock();
        state.journal.push(StorageCall::GetBucket {
            namespace: namespace.to_owned(),
            bucket: bucket.to_owned(),
        });
        if let Some(err) = state.injected("get_bucket") {
            return Err(err);
        }
        state
            .buckets
            .get(&(namespace.to_owned(), bucket.to_owned()))
            .cloned()
            .ok_or_else(|| {
                CloudError::status(
                    "get_bucket",
                    404,
                    "BucketNotFound",
                    format!("bucket {bucket} does not exist in namespace {namespace}"),
                )
            })
    }

    async fn create_bucket(&self, namespace: &str, bucket: &NewBucket) -> CloudResult<Bucket> {
        let mut state = self.state.lock();
        state.journal.push(StorageCall::CreateBucket {
            namespace: namespace.to_owned(),
            bucket: bucket.clone(),
        });
        if let Some(err) = state.injected("create_bucket") {
            return Err(err);
        }
        let key = (namespace.to_owned(), bucket.name.clone());
        if state.buckets.contains_key(&key) {
            return Err(CloudError::status(
                "create_bucket",
                409,
                "BucketAlreadyExists",
                format!("bucket {} already exists", bucket.name),
            ));
        }
        let created = Bucket {
            name: bucket.name.clone(),
            namespace: namespace.to_owned(),
            compartment_id: bucket.compartment_id.clone(),
            public_access_type: bucket.public_access_type,
        };
        state.buckets.insert(key, created.clone());
        Ok(created)
    }

    async fn put_object(
        &self,
        namespace: &str,
        bucket: &str,
        object: &str,
        body: Vec<u8>,
    ) -> CloudResult<()> {
        let mut state = self.state.lock();
        state.journal.push(StorageCall::PutObject {
            namespace: namespace.to_owned(),
            bucket: bucket.to_owned(),
            object: object.to_owned(),
        });
        if let Some(err) = state.injected("put_object") {
            return Err(err);
        }
        if !state
            .buckets
            .contains_key(&(namespace.to_owned(), bucket.to_owned()))
        {
            return Err(CloudError::status(
                "put_object",
                404,
                "BucketNotFound",
                format!("bucket {bucket} does not exist"),
            ));
        }
        state.objects.insert(
            (namespace.to_owned(), bucket.to_owned(), object.to_owned()),
            body,
        );
        Ok(())
    }
}

/// One `patch_records` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsPatch {
    /// Zone
    pub zone: String,
    /// Record name
    pub domain: String,
    /// Submitted changes
    pub operations: Vec<RecordOperation>,
}

#[derive(Debug, Default)]
struct DnsState {
    records: BTreeMap<String, BTreeSet<(String, String, String)>>,
    patches: Vec<DnsPatch>,
    fail_status: Option<u16>,
}

/// In-memory [`DnsApi`]
#[derive(Debug, Default)]
pub struct MockDns {
    state: Mutex<DnsState>,
}

impl MockDns {
    /// No zones, no records
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every patch fail with `status`
    pub fn fail_with(&self, status: u16) {
        self.state.lock().fail_status = Some(status);
    }

    /// Every patch, in order
    pub fn patches(&self) -> Vec<DnsPatch> {
        self.state.lock().patches.clone()
    }

    /// `(domain, rtype, rdata)` records currently in `zone`
    pub fn records(&self, zone: &str) -> BTreeSet<(String, String, String)> {
        self.state
            .lock()
            .records
            .get(zone)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl DnsApi for MockDns {
    async fn patch_records(
        &self,
        zone: &str,
        domain: &str,
        operations: &[RecordOperation],
    ) -> CloudResult<()> {
        let mut state = self.state.lock();
        state.patches.push(DnsPatch {
            zone: zone.to_owned(),
            domain: domain.to_owned(),
            operations: operations.to_vec(),
        });
        if let Some(status) = state.fail_status {
            return Err(CloudError::status(
                "patch_domain_records",
                status,
                "InjectedFailure",
                "injected failure",
            ));
        }
        let records = state.records.entry(zone.to_owned()).or_default();
        for op in operations {
            let record = (op.domain.clone(), op.rtype.clone(), op.rdata.clone());
            match op.operation {
                RecordOperationKind::Add => {
                    records.insert(record);
                }
                RecordOperationKind::Remove => {
                    records.remove(&record);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;

    use super::*;

    const LB: &str = "ocid1.loadbalancer.oc1..test";

    fn fake() -> MockLoadBalancer {
        MockLoadBalancer::new()
            .with_load_balancer(LB)
            .with_certificate(LB, "old")
            .with_listener(LB, https_listener("a", 443, "web", Some("old")))
    }

    fn new_cert(name: &str) -> NewCertificate {
        NewCertificate {
            certificate_name: name.into(),
            private_key: SecretString::from("key".to_string()),
            public_certificate: "chain".into(),
            passphrase: None,
        }
    }

    #[tokio::test]
    async fn create_takes_effect_on_success() {
        let lb = fake();
        let id = lb.create_certificate(LB, &new_cert("new")).await.unwrap();

        assert_eq!(lb.get_work_request(&id).await.unwrap().state, WorkRequestState::Accepted);
        assert_eq!(lb.certificate_names(LB), vec!["old".to_string()]);
        assert_eq!(lb.get_work_request(&id).await.unwrap().state, WorkRequestState::InProgress);
        assert_eq!(lb.get_work_request(&id).await.unwrap().state, WorkRequestState::Succeeded);
        assert_eq!(lb.certificate_names(LB), vec!["new".to_string(), "old".to_string()]);
        // Terminal state repeats.
        assert_eq!(lb.get_work_request(&id).await.unwrap().state, WorkRequestState::Succeeded);
    }

    #[tokio::test]
    async fn delete_of_certificate_in_use_fails_the_work_request() {
        let lb = fake().with_default_lifecycle([WorkRequestState::Succeeded]);
        let id = lb.delete_certificate(LB, "old").await.unwrap();

        let wr = lb.get_work_request(&id).await.unwrap();
        assert_eq!(wr.state, WorkRequestState::Failed);
        assert!(wr.failure_message().contains("in use by listener a"));
        assert_eq!(lb.certificate_names(LB), vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn delete_of_absent_certificate_is_not_found() {
        let lb = fake();
        let err = lb.delete_certificate(LB, "ghost").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            lb.calls().last().and_then(MockCall::work_request),
            None,
            "rejected calls carry no work request"
        );
    }

    #[tokio::test]
    async fn scripted_failure_leaves_listener_untouched() {
        let lb = fake().with_certificate(LB, "new");
        lb.script(
            MockTarget::UpdateListener("a".into()),
            [WorkRequestState::InProgress, WorkRequestState::Failed],
        );
        let listener = lb.snapshot(LB).unwrap().listeners["a"].clone();
        let update = ListenerUpdate::from_listener(&listener).with_certificate("new");
        let id = lb.update_listener(LB, "a", &update).await.unwrap();

        lb.get_work_request(&id).await.unwrap();
        assert_eq!(lb.get_work_request(&id).await.unwrap().state, WorkRequestState::Failed);
        assert_eq!(lb.bound_certificate(LB, "a").as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn injected_failure_is_targeted() {
        let lb = fake();
        lb.fail_call_for(MockOperation::UpdateListener, "b", 503);
        let listener = https_listener("a", 443, "web", Some("old"));
        let update = ListenerUpdate::from_listener(&listener);

        assert!(lb.update_listener(LB, "a", &update).await.is_ok());
        let err = lb.update_listener(LB, "b", &update).await.unwrap_err();
        assert_eq!(err.http_status(), Some(503));
    }

    #[tokio::test]
    async fn storage_bucket_lifecycle() {
        let storage = MockObjectStorage::new();
        assert!(storage.get_bucket("ns", "b").await.unwrap_err().is_not_found());
        assert!(storage.put_object("ns", "b", "o", vec![1]).await.is_err());

        storage
            .create_bucket("ns", &NewBucket::private("b", "compartment"))
            .await
            .unwrap();
        storage.put_object("ns", "b", "o", vec![1, 2]).await.unwrap();
        assert_eq!(storage.object("ns", "b", "o"), Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn dns_add_then_remove() {
        let dns = MockDns::new();
        let add = RecordOperation::txt(RecordOperationKind::Add, "_acme-challenge.a.example", "v", 30);
        let remove = RecordOperation {
            operation: RecordOperationKind::Remove,
            ..add.clone()
        };
        dns.patch_records("example", "_acme-challenge.a.example", &[add]).await.unwrap();
        assert_eq!(dns.records("example").len(), 1);
        dns.patch_records("example", "_acme-challenge.a.example", &[remove]).await.unwrap();
        assert!(dns.records("example").is_empty());
        assert_eq!(dns.patches().len(), 2);
    }
}
