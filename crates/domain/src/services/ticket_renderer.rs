//! Downloadable ticket documents.

use crate::models::{Event, Registration};

/// A rendered file ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Renders a committed registration into a document.
pub trait TicketRenderer: Send + Sync {
    fn render(&self, registration: &Registration, event: &Event) -> Result<RenderedDocument, String>;
}

/// Plain-text ticket.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextTicketRenderer;

impl TicketRenderer for PlainTextTicketRenderer {
    fn render(&self, registration: &Registration, event: &Event) -> Result<RenderedDocument, String> {
        let body = format!(
            "EVENT TICKET\n\
             ============\n\
             Ticket:   {ticket}\n\
             Status:   {status}\n\
             Event:    {name}\n\
             Location: {location}\n\
             Starts:   {starts}\n\
             Issued:   {issued}\n",
            ticket = registration.ticket_number,
            status = registration.status,
            name = event.name,
            location = event.location,
            starts = event.starts_at.format("%Y-%m-%d %H:%M UTC"),
            issued = registration.created_at.format("%Y-%m-%d %H:%M UTC"),
        );

        Ok(RenderedDocument {
            filename: format!("ticket-{}.txt", registration.ticket_number),
            content_type: "text/plain; charset=utf-8".to_string(),
            bytes: body.into_bytes(),
        })
    }
}
