use super::Operation;
use crate::error::{Error, Result};
use crate::xml::{Ns, XmlElement, XmlReader};

/// `ResponseClass` attribute of a response message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// The request succeeded.
    Success,
    /// The request succeeded with a warning.
    Warning,
    /// The request failed.
    Error,
    /// The attribute was missing or unrecognised. Treated as a failure.
    ParseError,
}

impl ResponseClass {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("Success") => ResponseClass::Success,
            Some("Warning") => ResponseClass::Warning,
            Some("Error") => ResponseClass::Error,
            _ => ResponseClass::ParseError,
        }
    }
}

/// One `m:<Operation>ResponseMessage`.
#[derive(Debug, Clone)]
pub struct ResponseMessage<P> {
    /// `ResponseClass` attribute.
    pub class: ResponseClass,
    /// `ResponseCode`, `NoError` on success.
    pub code: String,
    /// `MessageText`.
    pub text: Option<String>,
    /// Operation-specific content.
    pub payload: P,
}

impl<P> ResponseMessage<P> {
    /// `true` only for `ResponseClass::Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.class == ResponseClass::Success
    }

    /// `true` for `Success` and `Warning`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.class, ResponseClass::Success | ResponseClass::Warning)
    }

    /// Returns the payload, or [`Error::Response`] for a failed message.
    pub fn into_result(self, operation: &str) -> Result<P> {
        if self.is_ok() {
            Ok(self.payload)
        } else {
            Err(Error::Response {
                operation: operation.to_string(),
                code: self.code,
                message: self.text.unwrap_or_default(),
            })
        }
    }
}

/// Parses a SOAP response body for operation `O`.
///
/// A `soap:Fault` becomes [`Error::SoapFault`]. Failed response messages are
/// returned as messages, never as an error, so siblings stay usable.
pub fn parse_response<O: Operation>(body: &str) -> Result<Vec<ResponseMessage<O::Payload>>> {
    let mut reader = XmlReader::new(body);
    let envelope = reader.root()?;
    envelope.expect(&Ns::Soap, "Envelope")?;

    while let Some(child) = reader.next_child()? {
        if child.is(&Ns::Soap, "Body") {
            return read_body::<O>(&mut reader);
        }
        reader.skip(&child)?;
    }
    Err(Error::malformed("SOAP envelope has no Body"))
}

fn read_body<O: Operation>(reader: &mut XmlReader<'_>) -> Result<Vec<ResponseMessage<O::Payload>>> {
    let element = reader
        .next_child()?
        .ok_or_else(|| Error::malformed("empty SOAP Body"))?;

    if element.is(&Ns::Soap, "Fault") {
        return Err(read_fault(reader)?);
    }
    element.expect(&Ns::Messages, &format!("{}Response", O::NAME))?;

    let mut messages = Vec::new();
    while let Some(child) = reader.next_child()? {
        if !child.is(&Ns::Messages, "ResponseMessages") {
            reader.skip(&child)?;
            continue;
        }
        let message_name = format!("{}ResponseMessage", O::NAME);
        while let Some(message) = reader.next_child()? {
            message.expect(&Ns::Messages, &message_name)?;
            messages.push(read_message::<O>(reader, &message)?);
        }
    }
    Ok(messages)
}

fn read_message<O: Operation>(
    reader: &mut XmlReader<'_>,
    message: &XmlElement<'_>,
) -> Result<ResponseMessage<O::Payload>> {
    let class = ResponseClass::parse(message.attribute("ResponseClass")?.as_deref());
    let mut code = None;
    let mut text = None;
    let mut payload = O::Payload::default();

    while let Some(child) = reader.next_child()? {
        if child.ns() == &Ns::Messages {
            match child.local_name() {
                "ResponseCode" => {
                    code = Some(reader.read_text(&child)?);
                    continue;
                }
                "MessageText" => {
                    text = Some(reader.read_text(&child)?);
                    continue;
                }
                "DescriptiveLinkKey" | "MessageXml" => {
                    reader.skip(&child)?;
                    continue;
                }
                _ => {}
            }
        }
        O::read_payload(reader, &child, &mut payload)?;
    }

    let code = code.unwrap_or_else(|| match class {
        ResponseClass::Success => "NoError".to_string(),
        _ => String::new(),
    });

    Ok(ResponseMessage {
        class,
        code,
        text,
        payload,
    })
}

/// Reads `faultcode` / `faultstring` of a SOAP 1.1 fault, consuming it.
fn read_fault(reader: &mut XmlReader<'_>) -> Result<Error> {
    let mut code = String::new();
    let mut string = String::new();
    while let Some(child) = reader.next_child()? {
        match child.local_name() {
            "faultcode" => code = reader.read_text(&child)?.trim().to_string(),
            "faultstring" => string = reader.read_text(&child)?.trim().to_string(),
            _ => reader.skip(&child)?,
        }
    }
    Ok(Error::SoapFault { code, string })
}

/// Extracts a SOAP fault from an error response body, if it holds one.
pub(crate) fn parse_fault(body: &str) -> Option<Error> {
    let mut reader = XmlReader::new(body);
    let envelope = reader.root().ok()?;
    if !envelope.is(&Ns::Soap, "Envelope") {
        return None;
    }
    while let Some(child) = reader.next_child().ok()? {
        if child.is(&Ns::Soap, "Body") {
            let fault = reader.next_child().ok()??;
            if !fault.is(&Ns::Soap, "Fault") {
                return None;
            }
            return read_fault(&mut reader).ok();
        }
        reader.skip(&child).ok()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::GetFolder;

    const FAULT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <s:Fault>
      <faultcode xmlns:a="http://schemas.microsoft.com/exchange/services/2006/types">a:ErrorSchemaValidation</faultcode>
      <faultstring xml:lang="en-US">The request failed schema validation.</faultstring>
      <detail><e:ResponseCode xmlns:e="http://schemas.microsoft.com/exchange/services/2006/errors">ErrorSchemaValidation</e:ResponseCode></detail>
    </s:Fault>
  </s:Body>
</s:Envelope>"#;

    #[test]
    fn test_fault_is_terminal_error() {
        let err = parse_response::<GetFolder>(FAULT).unwrap_err();
        match err {
            Error::SoapFault { code, string } => {
                assert_eq!(code, "a:ErrorSchemaValidation");
                assert!(string.contains("schema validation"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_fault(FAULT).is_some());
        assert!(parse_fault("<html>Server Error</html>").is_none());
        assert!(parse_fault("not xml at all <").is_none());
    }

    #[test]
    fn test_response_classes() {
        let body = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Header><h:ServerVersionInfo xmlns:h="http://schemas.microsoft.com/exchange/services/2006/types" MajorVersion="15"/></s:Header>
  <s:Body>
    <m:GetFolderResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
      <m:ResponseMessages>
        <m:GetFolderResponseMessage ResponseClass="Success">
          <m:ResponseCode>NoError</m:ResponseCode>
          <m:Folders><t:Folder><t:FolderId Id="A"/></t:Folder></m:Folders>
        </m:GetFolderResponseMessage>
        <m:GetFolderResponseMessage ResponseClass="Error">
          <m:MessageText>The specified folder could not be found in the store.</m:MessageText>
          <m:ResponseCode>ErrorFolderNotFound</m:ResponseCode>
          <m:DescriptiveLinkKey>0</m:DescriptiveLinkKey>
          <m:Folders/>
        </m:GetFolderResponseMessage>
        <m:GetFolderResponseMessage ResponseClass="Warning">
          <m:ResponseCode>ErrorBatchProcessingStopped</m:ResponseCode>
          <m:Folders/>
        </m:GetFolderResponseMessage>
        <m:GetFolderResponseMessage ResponseClass="Bogus">
          <m:ResponseCode>NoError</m:ResponseCode>
          <m:Folders/>
        </m:GetFolderResponseMessage>
      </m:ResponseMessages>
    </m:GetFolderResponse>
  </s:Body>
</s:Envelope>"#;

        let messages = parse_response::<GetFolder>(body).unwrap();
        assert_eq!(messages.len(), 4);

        assert!(messages[0].is_success());
        assert_eq!(messages[0].payload.len(), 1);

        assert!(!messages[1].is_ok());
        assert_eq!(messages[1].code, "ErrorFolderNotFound");
        let err = messages[1].clone().into_result("GetFolder").unwrap_err();
        assert!(matches!(err, Error::Response { ref code, .. } if code == "ErrorFolderNotFound"));

        assert!(messages[2].is_ok());
        assert!(!messages[2].is_success());

        assert_eq!(messages[3].class, ResponseClass::ParseError);
        assert!(!messages[3].is_ok());
    }

    #[test]
    fn test_wrong_response_element_rejected() {
        let body = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>
<m:FindFolderResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages"/>
</s:Body></s:Envelope>"#;
        assert!(matches!(
            parse_response::<GetFolder>(body),
            Err(Error::UnexpectedElement { .. })
        ));
    }

    #[test]
    fn test_non_soap_body_rejected() {
        assert!(parse_response::<GetFolder>("<html><body>hi</body></html>").is_err());
    }
}
