use std::net::SocketAddr;
use std::sync::Arc;

use crate::admin::AdminConsole;
use crate::gateway::server::RequestHandler;
use crate::protocol::Request;
use crate::scheduler::AdmissionController;

/// Master role: jobs go through admission control, admin requests to the
/// console.
pub struct MasterService {
    admission: Arc<AdmissionController>,
    admin: AdminConsole,
}

impl MasterService {
    pub fn new(admission: Arc<AdmissionController>, admin: AdminConsole) -> Self {
        Self { admission, admin }
    }
}

impl RequestHandler for MasterService {
    async fn handle(&self, request: Request, peer: SocketAddr) -> String {
        match request {
            Request::Execute(job) => {
                tracing::info!(
                    job_id = %job.id,
                    peer = %peer,
                    language = %job.language,
                    bytes = job.source.len(),
                    "Job received"
                );
                self.admission.submit(job).await
            }
            Request::Admin(admin) => self.admin.handle(&admin, peer),
        }
    }
}
