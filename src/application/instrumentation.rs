use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use crate::domain::error::ScanError;
use crate::domain::ports::ObjectExtractor;
use crate::domain::programmable_object::ProgrammableObject;
use crate::domain::target::ConnectionDescriptor;

/// Tracing decorator over an `ObjectExtractor`, in the shape of the
/// teacher's `MonitoringRowRepository`: every suspending boundary gets its
/// own span instead of the port implementation logging directly.
pub struct InstrumentedExtractor<E: ObjectExtractor> {
    inner: Arc<E>,
}

impl<E: ObjectExtractor> InstrumentedExtractor<E> {
    pub fn new(inner: Arc<E>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<E: ObjectExtractor> ObjectExtractor for InstrumentedExtractor<E> {
    #[instrument(name = "test_connection", skip(self, conn), fields(db.host = %conn.host, db.database = %conn.database), level = "info")]
    async fn test_connection(
        &self,
        conn: &ConnectionDescriptor,
        deadline: Duration,
    ) -> Result<(bool, String), ScanError> {
        self.inner.test_connection(conn, deadline).await
    }

    #[instrument(name = "extract_all", skip(self, conn), fields(db.host = %conn.host, db.database = %conn.database), level = "info")]
    async fn extract_all(
        &self,
        conn: &ConnectionDescriptor,
        deadline: Duration,
    ) -> Result<Vec<ProgrammableObject>, ScanError> {
        self.inner.extract_all(conn, deadline).await
    }

    #[instrument(name = "extract_single", skip(self, conn), fields(db.host = %conn.host, db.schema = %schema, db.name = %name), level = "info")]
    async fn extract_single(
        &self,
        conn: &ConnectionDescriptor,
        schema: &str,
        name: &str,
        deadline: Duration,
    ) -> Result<Option<ProgrammableObject>, ScanError> {
        self.inner.extract_single(conn, schema, name, deadline).await
    }
}
