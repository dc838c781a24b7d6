/// Navigation primitive that sends the user to the login entry point.
///
/// Supplied at construction time to both the interceptor and the refresh
/// manager. Any `Fn()` closure qualifies.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self);
}

impl<F> LoginRedirect for F
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        self()
    }
}
