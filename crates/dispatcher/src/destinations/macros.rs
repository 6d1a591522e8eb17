//! Macros for built-in destinations

/// Implement `DestinationPlugin` for a destination that handles every event
/// type the same way.
///
/// The six per-type handlers all forward to `$deliver`, an inherent
/// `async fn(&self, &AnalyticsEvent, &EventContext) -> Result<Delivery, ContractError>`.
/// Remaining trait items are written inside the braces.
///
/// # Example
///
/// ```ignore
/// forward_event_handlers!(LogDestination => deliver {
///     fn destination_type(&self) -> &str { "log" }
///     fn version(&self) -> &str { "1.0.0" }
///     async fn initialize(&mut self, settings: &Settings) -> Result<(), ContractError> { Ok(()) }
/// });
/// ```
macro_rules! forward_event_handlers {
    ($ty:ty => $deliver:ident { $($items:tt)* }) => {
        forward_event_handlers!(
            @impl $ty, $deliver,
            [track, page, identify, group, alias, consent],
            { $($items)* }
        );
    };

    (@impl $ty:ty, $deliver:ident, [$($handler:ident),*], { $($items:tt)* }) => {
        #[::async_trait::async_trait]
        impl ::contracts::DestinationPlugin for $ty {
            $($items)*

            $(
                async fn $handler(
                    &self,
                    event: &::contracts::AnalyticsEvent,
                    ctx: &::contracts::EventContext,
                ) -> ::std::result::Result<::contracts::Delivery, ::contracts::ContractError> {
                    self.$deliver(event, ctx).await
                }
            )*
        }
    };
}
