use serde::{Deserialize, Serialize};

/// Who is making a request, as asserted by the caller.
///
/// `signature` is the caller's hex signature over the allocation's
/// transaction hash digest; the node checks it against the allocation owner
/// before serving owner-only requests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub client_id: String,
    pub public_key: String,
    pub signature: String,
}

impl CallerIdentity {
    pub fn new(
        client_id: impl Into<String>,
        public_key: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            public_key: public_key.into(),
            signature: signature.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.client_id.is_empty()
    }
}
