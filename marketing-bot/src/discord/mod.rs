//! Discord over the HTTP interactions model: signed requests come in on the
//! API server, replies and channel messages go out over REST.

pub(crate) mod client;
pub(crate) mod model;
pub(crate) mod verify;

pub(crate) use client::{DiscordClient, InteractionReply, Notifier, notify_channel, render_final};
pub(crate) use model::{Interaction, InteractionType, Requester, response};
pub(crate) use verify::SignatureVerifier;
