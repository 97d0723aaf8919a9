//! Request-scoped context module.
//!
//! Provides the `Actor` extractor that turns request headers into the
//! `ActorContext` every coordinator call takes. Nothing about the caller is
//! kept between requests.

mod extractor;

pub use extractor::{
    Actor, ActorRejection, ACTOR_EMAIL, ACTOR_NAME, ACTOR_ORGANIZATION, ACTOR_ROLE,
};
