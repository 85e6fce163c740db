//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use tienda_correo::{CorreoClient, CorreoError};

use crate::config::StorefrontConfig;
use crate::services::checkout::{Checkout, PgCheckoutStore};
use crate::services::payments::{MercadoPagoClient, PaymentError, PaymentGateway};
use crate::services::shipping::ShippingService;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("correo client: {0}")]
    Correo(#[from] CorreoError),
    #[error("mercado pago client: {0}")]
    Payment(#[from] PaymentError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    shipping: ShippingService,
    payments: Option<Arc<dyn PaymentGateway>>,
    checkout_store: PgCheckoutStore,
}

impl AppState {
    /// Create the application state with the production clients.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payments = match &config.mercadopago {
            Some(mp) => {
                let client = MercadoPagoClient::new(mp, &config.base_url)?;
                Some(Arc::new(client) as Arc<dyn PaymentGateway>)
            }
            None => None,
        };
        Self::with_payments(config, pool, payments)
    }

    /// Create the application state with a caller-provided payment gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the carrier client cannot be built.
    pub fn with_payments(
        config: StorefrontConfig,
        pool: PgPool,
        payments: Option<Arc<dyn PaymentGateway>>,
    ) -> Result<Self, StateError> {
        let correo = CorreoClient::new(config.correo.client.clone())?;
        let shipping = ShippingService::new(
            correo,
            config.correo.origin_postal_code.clone(),
            config.correo.sender.clone(),
        );
        let checkout_store = PgCheckoutStore::new(pool.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                shipping,
                payments,
                checkout_store,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the shipping service.
    #[must_use]
    pub fn shipping(&self) -> &ShippingService {
        &self.inner.shipping
    }

    /// The payment gateway, if online payment is configured.
    #[must_use]
    pub fn payments(&self) -> Option<&dyn PaymentGateway> {
        self.inner.payments.as_deref()
    }

    /// A checkout sequencer wired to the database, carrier and payment
    /// provider.
    #[must_use]
    pub fn checkout(&self) -> Checkout<'_> {
        Checkout::new(
            &self.inner.checkout_store,
            &self.inner.shipping,
            self.payments(),
            self.inner.config.free_shipping_threshold,
        )
    }
}
