use modelcheck_client::{RestBackend, RestConfig};
use modelcheck_common::AuthMode;
use modelcheck_suite::Hosts;

use crate::args::Args;

pub fn auth_mode(args: &Args) -> AuthMode {
    AuthMode::from_parts(
        args.token.clone(),
        args.jwt_sub.clone(),
        Some(args.user.clone()),
        Some(args.password.clone()),
    )
}

pub fn rest_backend(args: &Args, hosts: &Hosts) -> anyhow::Result<RestBackend> {
    let mut config = RestConfig::new(hosts.public.clone(), args.namespace.clone());
    config.private_url = hosts.private.clone();
    config.auth = auth_mode(args);
    tracing::debug!(
        public = %hosts.public,
        private = %hosts.private,
        auth = config.auth.describe(),
        "using REST backend"
    );
    Ok(RestBackend::new(config)?)
}
