use super::audit::AuditRecorder;
use super::dedup::{DedupChecker, DedupDecision};
use super::error_router::{ClassificationMiss, ErrorDisposition, ErrorRouter};
use super::extractor::FieldExtractor;
use super::key_lock::KeyedLocks;
use super::normalizer;
use super::projection;
use super::resolver::RoutingResolver;
use crate::config::GatewayConfig;
use crate::domain::message::{InboundMessage, MessageHeader};
use crate::domain::ports::{AuditRepositoryRef, PublisherRef};
use crate::error::{GatewayError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pipeline states, used for transition logging and terminal reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Normalized,
    ParseOk,
    Classified,
    DedupChecked,
    Audited,
    Published,
    Stop,
    ParseFail,
    ClassifyMiss,
    ErrorClassified,
    Dropped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Received => "RECEIVED",
            PipelineState::Normalized => "NORMALIZED",
            PipelineState::ParseOk => "PARSE_OK",
            PipelineState::Classified => "CLASSIFIED",
            PipelineState::DedupChecked => "DEDUP_CHECKED",
            PipelineState::Audited => "AUDITED",
            PipelineState::Published => "PUBLISHED",
            PipelineState::Stop => "STOP",
            PipelineState::ParseFail => "PARSE_FAIL",
            PipelineState::ClassifyMiss => "CLASSIFY_MISS",
            PipelineState::ErrorClassified => "ERROR_CLASSIFIED",
            PipelineState::Dropped => "DROPPED",
        };
        f.write_str(name)
    }
}

/// Counts of finished publish attempts. Failures are logged, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

impl PublishReport {
    fn merge(&mut self, other: PublishReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// `scheduled` deliveries were handed to a background publish task.
    Published {
        header: MessageHeader,
        channel: String,
        scheduled: usize,
    },
    Duplicate {
        message_id: String,
        version: u32,
    },
    ErrorRouted {
        header: MessageHeader,
        channel: String,
        scheduled: usize,
    },
    Dropped {
        reason: String,
    },
}

impl PipelineOutcome {
    pub fn terminal_state(&self) -> PipelineState {
        match self {
            PipelineOutcome::Published { .. } | PipelineOutcome::ErrorRouted { .. } => {
                PipelineState::Published
            }
            PipelineOutcome::Duplicate { .. } => PipelineState::Stop,
            PipelineOutcome::Dropped { .. } => PipelineState::Dropped,
        }
    }
}

/// A well-formed, routable message ready for dedup and audit.
struct ClassifiedMessage {
    header: MessageHeader,
    channel: String,
    publish_key: Option<String>,
    transformed: serde_json::Value,
}

enum Classification {
    Classified(Box<ClassifiedMessage>),
    Miss(ClassificationMiss),
}

struct Delivery {
    channel: String,
    key: Option<String>,
    payload: String,
}

/// Everything the pipeline decided before publishing.
enum Disposition {
    Deliver {
        header: MessageHeader,
        channel: String,
        deliveries: Vec<Delivery>,
        invalid: bool,
    },
    Duplicate {
        message_id: String,
        version: u32,
    },
    Dropped {
        reason: String,
    },
}

#[derive(Deserialize)]
struct RequestEnvelope {
    data_base64: Option<String>,
}

/// Classify, deduplicate, audit and route single inbound messages.
pub struct MessageGateway {
    config: Arc<GatewayConfig>,
    extractor: FieldExtractor,
    resolver: RoutingResolver,
    dedup: DedupChecker,
    audit: AuditRecorder,
    error_router: ErrorRouter,
    publisher: PublisherRef,
    locks: KeyedLocks,
    in_flight: Mutex<Vec<JoinHandle<PublishReport>>>,
}

impl MessageGateway {
    /// Builds the pipeline around a repository and a publisher.
    ///
    /// # Errors
    /// Returns `InvalidPath` if a header path expression does not compile.
    pub fn new(
        config: Arc<GatewayConfig>,
        repository: AuditRepositoryRef,
        publisher: PublisherRef,
    ) -> Result<Self> {
        let resolver = RoutingResolver::new(config.clone());
        let audit = AuditRecorder::new(repository.clone(), config.clone());
        Ok(Self {
            extractor: FieldExtractor::new(&config)?,
            dedup: DedupChecker::new(repository),
            error_router: ErrorRouter::new(resolver.clone(), audit.clone(), config.clone()),
            resolver,
            audit,
            publisher,
            locks: KeyedLocks::new(),
            in_flight: Mutex::default(),
            config,
        })
    }

    /// Accepts a raw request body of the form `{"data_base64": "..."}`.
    pub async fn process_request(&self, raw_json: &str) -> Result<PipelineOutcome> {
        let decoded = decode_request(raw_json)?;
        self.handle(&decoded).await
    }

    /// Runs the pipeline for one decoded message.
    ///
    /// Everything up to and including the audit write is bounded by the
    /// request deadline. Publishing runs in a spawned task afterwards, so a
    /// slow or failing broker neither delays nor fails the call.
    pub async fn handle(&self, decoded: &str) -> Result<PipelineOutcome> {
        let deadline = self.config.request_timeout();
        let disposition = tokio::time::timeout(deadline, self.decide(decoded))
            .await
            .map_err(|_| GatewayError::Timeout(deadline))??;

        let outcome = match disposition {
            Disposition::Deliver {
                header,
                channel,
                deliveries,
                invalid,
            } => {
                let scheduled = deliveries.len();
                self.spawn_publish(header.message_id.clone(), deliveries);
                if invalid {
                    PipelineOutcome::ErrorRouted {
                        header,
                        channel,
                        scheduled,
                    }
                } else {
                    PipelineOutcome::Published {
                        header,
                        channel,
                        scheduled,
                    }
                }
            }
            Disposition::Duplicate {
                message_id,
                version,
            } => PipelineOutcome::Duplicate {
                message_id,
                version,
            },
            Disposition::Dropped { reason } => PipelineOutcome::Dropped { reason },
        };

        info!(state = %outcome.terminal_state(), "pipeline finished");
        Ok(outcome)
    }

    async fn decide(&self, decoded: &str) -> Result<Disposition> {
        transition(PipelineState::Received, PipelineState::Normalized);
        let message = normalizer::normalize(decoded);

        let classified = match self.classify(&message) {
            Classification::Classified(classified) => classified,
            Classification::Miss(miss) => return self.route_error(&message, miss).await,
        };
        let ClassifiedMessage {
            header,
            channel,
            publish_key,
            transformed,
        } = *classified;

        // Held until the audit write so concurrent copies of the same id
        // observe each other's capture.
        let _guard = self.locks.lock(&header.message_id).await;

        let decision = self.dedup.check(&header.message_id).await?;
        transition(PipelineState::Classified, PipelineState::DedupChecked);
        if let DedupDecision::Duplicate { version } = decision {
            warn!(message_id = %header.message_id, version, "duplicate submission stopped");
            return Ok(Disposition::Duplicate {
                message_id: header.message_id,
                version,
            });
        }

        let original = message.original();
        self.audit
            .record(&header, &original, transformed, false)
            .await?;
        transition(PipelineState::DedupChecked, PipelineState::Audited);

        let deliveries = vec![
            Delivery {
                channel: channel.clone(),
                key: publish_key.clone(),
                payload: original.clone(),
            },
            Delivery {
                channel: self.config.tracking_channel.clone(),
                key: publish_key,
                payload: original,
            },
        ];

        Ok(Disposition::Deliver {
            header,
            channel,
            deliveries,
            invalid: false,
        })
    }

    fn classify(&self, message: &InboundMessage) -> Classification {
        let doc = match FieldExtractor::parse(&message.body) {
            Ok(doc) => doc,
            Err(e) => {
                transition(PipelineState::Normalized, PipelineState::ParseFail);
                return Classification::Miss(ClassificationMiss::ParseFailure(e.to_string()));
            }
        };
        transition(PipelineState::Normalized, PipelineState::ParseOk);

        let Some(message_type) = self.extractor.extract_message_type(&doc) else {
            return Classification::Miss(ClassificationMiss::MissingMessageType);
        };
        let Some(route) = self.resolver.resolve_route(&message_type) else {
            return Classification::Miss(ClassificationMiss::NoRoute { message_type });
        };
        let Some(message_id) = self.extractor.extract_message_id(&doc) else {
            return Classification::Miss(ClassificationMiss::MissingMessageId { message_type });
        };

        let (batch_id, publish_key) = match self.extractor.extract_batch_id(&message_type, &doc) {
            Ok(batch_id) => (batch_id.clone(), batch_id),
            Err(e) => {
                warn!(%message_type, error = %e, "batch id extraction failed, using sentinel key");
                (None, Some(self.config.batch_key_sentinel.clone()))
            }
        };

        let header = MessageHeader {
            source: self
                .extractor
                .extract_source(&doc)
                .unwrap_or_else(|| self.config.default_source.clone()),
            possible_duplicate: self.extractor.extract_possible_duplicate(&doc),
            message_id,
            message_type,
            target: route.target,
            direction: route.direction,
            category: route.category,
            batch_id,
            invalid: false,
        };
        let transformed = projection::project(&header, &doc);
        transition(PipelineState::ParseOk, PipelineState::Classified);

        Classification::Classified(Box::new(ClassifiedMessage {
            header,
            channel: route.channel,
            publish_key,
            transformed,
        }))
    }

    async fn route_error(
        &self,
        message: &InboundMessage,
        miss: ClassificationMiss,
    ) -> Result<Disposition> {
        if !matches!(miss, ClassificationMiss::ParseFailure(_)) {
            transition(PipelineState::ParseOk, PipelineState::ClassifyMiss);
        }

        match self.error_router.route(&message.original(), &miss).await? {
            ErrorDisposition::Routed {
                header,
                channel,
                payload,
            } => {
                transition(PipelineState::ErrorClassified, PipelineState::Audited);
                let key = header.message_id.clone();
                Ok(Disposition::Deliver {
                    header,
                    deliveries: vec![Delivery {
                        channel: channel.clone(),
                        key: Some(key),
                        payload,
                    }],
                    channel,
                    invalid: true,
                })
            }
            ErrorDisposition::Dropped => Ok(Disposition::Dropped {
                reason: miss.to_string(),
            }),
        }
    }

    fn spawn_publish(&self, message_id: String, deliveries: Vec<Delivery>) {
        let task = tokio::spawn(publish_all(
            self.publisher.clone(),
            self.config.publish_timeout(),
            message_id,
            deliveries,
        ));
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|task| !task.is_finished());
        in_flight.push(task);
    }

    /// Waits for every publish task still running.
    ///
    /// Tasks that finished before the call are not counted again; their
    /// results were already logged.
    pub async fn drain_publishes(&self) -> PublishReport {
        let tasks = mem::take(&mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner));
        let mut report = PublishReport::default();
        for task in tasks {
            match task.await {
                Ok(finished) => report.merge(finished),
                Err(e) => warn!(error = %e, "publish task did not complete"),
            }
        }
        report
    }
}

async fn publish_all(
    publisher: PublisherRef,
    limit: Duration,
    message_id: String,
    deliveries: Vec<Delivery>,
) -> PublishReport {
    let mut report = PublishReport::default();
    for delivery in deliveries {
        let attempt = publisher.publish(&delivery.payload, &delivery.channel, delivery.key.as_deref());
        let result = match tokio::time::timeout(limit, attempt).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(limit)),
        };
        match result {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                warn!(%message_id, channel = %delivery.channel, error = %e, "publish failed");
            }
        }
    }
    debug!(%message_id, delivered = report.delivered, failed = report.failed, "publish finished");
    report
}

fn transition(from: PipelineState, to: PipelineState) {
    debug!(%from, %to, "pipeline transition");
}

/// Extracts and decodes `data_base64` from a request body.
pub fn decode_request(raw_json: &str) -> Result<String> {
    let envelope: RequestEnvelope = serde_json::from_str(raw_json)
        .map_err(|e| GatewayError::Envelope(format!("request is not valid JSON: {e}")))?;
    let encoded = envelope
        .data_base64
        .ok_or_else(|| GatewayError::Envelope("missing field data_base64".to_string()))?;
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    String::from_utf8(bytes)
        .map_err(|e| GatewayError::Envelope(format!("payload is not UTF-8: {e}")))
}
