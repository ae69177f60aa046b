//  KAFKA.rs
//    by Ray Plante
//
//  Description:
//!   Implements the Kafka plumbing shared by every job office binary that
//!   talks to the event broker: topic provisioning, sending an event, and
//!   the client-side selector matching that stands in for the broker's
//!   lack of server-side content filtering.

use std::fmt::{Display, Formatter, Result as FResult};
use std::time::Duration;

use log::info;
use rdkafka::ClientConfig;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication, TopicResult};
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::message::Message;
use rdkafka::producer::{BaseProducer, BaseRecord, FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use specifications::event::Selector;


/***** ERRORS *****/
/// Defines errors that relate to Kafka helpers.
#[derive(Debug)]
pub enum Error {
    /// Failed to create a new admin client to the given brokers.
    AdminClientError{ brokers: String, err: rdkafka::error::KafkaError },
    /// failed to send the command to create new Kafka topics.
    TopicsCreateError{ brokers: String, err: rdkafka::error::KafkaError },
    /// Failed to create a new Kafka topic.
    TopicCreateError{ brokers: String, topic: String, err: rdkafka::error::RDKafkaErrorCode },

    /// Failed to send an event to a topic.
    SendError{ topic: String, err: String },

    /// Failed to build a (synchronous) consumer or producer client.
    ClientError{ brokers: String, err: rdkafka::error::KafkaError },
    /// Failed to subscribe a consumer to its topic list.
    SubscribeError{ topics: Vec<String>, err: rdkafka::error::KafkaError },
    /// A poll on the broker connection itself returned an error (as opposed
    /// to simply finding nothing within the timeout).
    PollError{ err: rdkafka::error::KafkaError },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use Error::*;
        match self {
            AdminClientError{ brokers, err }        => write!(f, "Failed to create admin client to Kafka brokers '{}': {}", brokers, err),
            TopicsCreateError{ brokers, err }       => write!(f, "Failed to create new topics on Kafka brokers '{}': {}", brokers, err),
            TopicCreateError{ brokers, topic, err } => write!(f, "Failed to create new topic '{}' on Kafka brokers '{}': {}", topic, brokers, err),

            SendError{ topic, err } => write!(f, "Failed to send event to topic '{}': {}", topic, err),

            ClientError{ brokers, err }   => write!(f, "Failed to create Kafka client for brokers '{}': {}", brokers, err),
            SubscribeError{ topics, err } => write!(f, "Failed to subscribe to topic(s) {:?}: {}", topics, err),
            PollError{ err }              => write!(f, "Failed to poll Kafka broker connection: {}", err),
        }
    }
}

impl std::error::Error for Error {}





/***** LIBRARY *****/
/// Ensures that the given topics are registered with the underlying Kafka subsystem.
/// 
/// # Arguments
/// - `topics`: The list of topics to register.
/// - `brokers`: The (comma-separated list) of brokers to register them with.
/// 
/// # Errors
/// This function may error if we failed to ensure the topics. This is likely due to the brokers not being available.
pub async fn ensure_topics(topics: Vec<&str>, brokers: &str) -> Result<(), Error> {
    // Connect with admin rights
    let admin_client: AdminClient<_> = match ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .create()
    {
        Ok(client) => client,
        Err(err)   => { return Err(Error::AdminClientError { brokers: brokers.into(), err }); }
    };

    // Parse the list of topics as Kafka structures
    let topics: Vec<NewTopic> = topics
        .iter()
        .map(|t| NewTopic::new(t, 1, TopicReplication::Fixed(1)))
        .collect();

    // Run them
    let results: Vec<TopicResult> = match admin_client.create_topics(topics.iter(), &AdminOptions::new()).await {
        Ok(results) => results,
        Err(err)    => { return Err(Error::TopicsCreateError{ brokers: brokers.into(), err }); },
    };

    // Report on the results. Don't consider 'TopicAlreadyExists' an error.
    for result in results {
        match result {
            Ok(topic)           => info!("Kafka topic '{}' created.", topic),
            Err((topic, error)) => match error {
                // Do not error on topics that already exist
                RDKafkaErrorCode::TopicAlreadyExists => {
                    info!("Kafka topic '{}' already exists.", topic);
                }
                // Otherwise, do
                err => {
                    return Err(Error::TopicCreateError{ brokers: brokers.into(), topic, err });
                }
            },
        }
    }

    // Done
    Ok(())
}



/// Sends a serialized event to a topic, keyed by `key` (typically the run
/// ID, so all events for one run land on the same partition and so preserve
/// their relative order).
///
/// # Errors
/// This function errors if the broker rejects or can't be reached to accept the send.
pub async fn send_event(producer: &FutureProducer, topic: &str, key: &str, payload: &str) -> Result<(), Error> {
    let record = FutureRecord::to(topic).key(key).payload(payload);
    match producer.send(record, Timeout::After(Duration::from_secs(10))).await {
        Ok(_)            => Ok(()),
        Err((err, _msg)) => Err(Error::SendError{ topic: topic.into(), err: err.to_string() }),
    }
}



/// Builds a synchronous (`BaseConsumer`) Kafka consumer subscribed to
/// `topics`, for use on a plain OS-thread loop that has no async runtime
/// to drive a `StreamConsumer`.
///
/// # Errors
/// Errors if the client can't be built for `brokers`, or if it can't
/// subscribe to `topics`.
pub fn make_consumer(brokers: &str, group_id: &str, topics: &[&str]) -> Result<BaseConsumer, Error> {
    let consumer: BaseConsumer = match ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "true")
        .create()
    {
        Ok(consumer) => consumer,
        Err(err) => { return Err(Error::ClientError{ brokers: brokers.into(), err }); },
    };
    if let Err(err) = consumer.subscribe(topics) {
        return Err(Error::SubscribeError{ topics: topics.iter().map(|t| t.to_string()).collect(), err });
    }
    Ok(consumer)
}



/// Polls `consumer` once, waiting up to `timeout` for a message. Returns
/// `None` on a timeout (nothing to read yet), never blocking longer than
/// `timeout`.
///
/// # Errors
/// Errors if the poll itself failed (broker unreachable, etc.) or if a
/// message arrived but its payload or key wasn't valid UTF-8; both are
/// reported as [`Error::PollError`].
pub fn poll_once(consumer: &BaseConsumer, timeout: Duration) -> Result<Option<(String, String, String)>, Error> {
    let message = match consumer.poll(timeout) {
        None             => return Ok(None),
        Some(Ok(message)) => message,
        Some(Err(err))    => { return Err(Error::PollError{ err }); },
    };

    let topic: String = message.topic().to_string();
    let key: String = match message.key_view::<str>() {
        Some(Ok(key)) => key.to_string(),
        _             => String::new(),
    };
    let payload: String = match message.payload_view::<str>() {
        Some(Ok(payload)) => payload.to_string(),
        _                 => String::new(),
    };
    Ok(Some((topic, key, payload)))
}



/// Builds a synchronous (`BaseProducer`) Kafka producer, for use on a
/// plain OS-thread loop that has no async runtime to drive a `FutureProducer`.
///
/// # Errors
/// Errors if the client can't be built for `brokers`.
pub fn make_producer(brokers: &str) -> Result<BaseProducer, Error> {
    match ClientConfig::new().set("bootstrap.servers", brokers).create() {
        Ok(producer) => Ok(producer),
        Err(err)     => Err(Error::ClientError{ brokers: brokers.into(), err }),
    }
}



/// Sends one event to `topic`, keyed by `key`, via a synchronous producer.
/// The send is fire-and-forget from the caller's perspective: `BaseProducer`
/// queues the record and delivers it on its own background poll thread, so
/// this only reports errors detected at enqueue time (e.g. a full queue).
///
/// # Errors
/// Errors if the record couldn't be enqueued for sending.
pub fn send_event_sync(producer: &BaseProducer, topic: &str, key: &str, payload: &str) -> Result<(), Error> {
    let record = BaseRecord::to(topic).key(key).payload(payload);
    match producer.send(record) {
        Ok(())           => Ok(()),
        Err((err, _msg)) => Err(Error::SendError{ topic: topic.into(), err: err.to_string() }),
    }
}



/// Checks whether an event's `(run_id, status, destination_id)` fields
/// satisfy a [`Selector`], the client-side counterpart to the broker's
/// content-based selector strings: Kafka itself only filters by topic, so
/// every consumer re-checks each message it reads against the selector it
/// subscribed with and discards the ones that don't match.
pub fn matches_selector(selector: &Selector, run_id: &str, status: &str, destination_id: Option<&str>) -> bool {
    selector.matches("RUNID", run_id)
        && selector.matches("STATUS", status)
        && destination_id.map_or(true, |d| selector.matches("DESTINATIONID", d))
}
