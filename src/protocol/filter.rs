use tracing::trace;

use crate::dispatch::Dispatch;
use crate::protocol::DiscoveryMessage;
use crate::utils::error::DispatchError;

/// Forwards discovery messages of one group and drops everything else.
///
/// Many broadcasters may share a discovery transport, so a foreign group is
/// the normal case rather than an error.
pub struct GroupMessageFilter<D> {
    group: String,
    target: D,
}

impl<D> GroupMessageFilter<D> {
    pub fn new(group: impl Into<String>, target: D) -> Self {
        Self {
            group: group.into(),
            target,
        }
    }
}

impl<D> Dispatch<DiscoveryMessage> for GroupMessageFilter<D>
where
    D: Dispatch<DiscoveryMessage>,
{
    fn dispatch(&self, message: DiscoveryMessage) -> Result<(), DispatchError> {
        if message.group() != self.group {
            trace!(group = %self.group, other = message.group(), "Dropping discovery message for foreign group");
            return Ok(());
        }
        self.target.dispatch(message)
    }
}
