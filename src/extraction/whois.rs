use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Upper bound on `refer:` hops after the first server
const MAX_REFERRALS: usize = 2;

/// Failure of a WHOIS exchange
#[derive(Debug)]
pub enum WhoisError {
    Timeout,
    Io(io::Error),
}

/// Ask `server` about `domain`, following `refer:` answers.
///
/// Returns the answer of the last server that replied.
pub async fn lookup(
    server: &str,
    port: u16,
    domain: &str,
    timeout: Duration,
) -> Result<String, WhoisError> {
    let exchange = async {
        let mut answer = query(server, port, domain).await?;
        let mut asked = server.to_ascii_lowercase();

        for _ in 0..MAX_REFERRALS {
            let next = match referral(&answer) {
                Some(next) if next != asked => next,
                _ => break,
            };
            tracing::trace!(domain, server = %next, "Following WHOIS referral");
            answer = query(&next, port, domain).await?;
            asked = next;
        }

        Ok::<_, io::Error>(answer)
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok(answer)) => Ok(answer),
        Ok(Err(e)) => Err(WhoisError::Io(e)),
        Err(_) => Err(WhoisError::Timeout),
    }
}

async fn query(server: &str, port: u16, domain: &str) -> io::Result<String> {
    let mut stream = TcpStream::connect((server, port)).await?;
    stream.write_all(format!("{}\r\n", domain).as_bytes()).await?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Server named on a `refer:` line, lowercased
pub fn referral(answer: &str) -> Option<String> {
    answer.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if !key.trim().eq_ignore_ascii_case("refer") {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_ascii_lowercase())
    })
}

/// Whether an answer holds an actual registration record
pub fn is_complete(answer: &str) -> bool {
    if answer.trim().is_empty() {
        return false;
    }
    let lowered = answer.to_ascii_lowercase();
    !(lowered.contains("no match") || lowered.contains("not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_referral() {
        let answer = "% IANA WHOIS server\n\nrefer:        whois.Verisign-Grs.com\n\ndomain: COM\n";
        assert_eq!(referral(answer).as_deref(), Some("whois.verisign-grs.com"));
        assert_eq!(referral("domain: COM\n"), None);
        assert_eq!(referral("refer:   \n"), None);
    }

    #[test]
    fn test_is_complete() {
        assert!(is_complete("Domain Name: EXAMPLE.COM\nRegistrar: Example"));
        assert!(!is_complete(""));
        assert!(!is_complete("   \r\n"));
        assert!(!is_complete("No match for \"NOPE-NOPE.COM\"."));
        assert!(!is_complete("Domain not found."));
    }

    #[tokio::test]
    async fn test_lookup_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let n = socket.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"example.com\r\n");
            socket
                .write_all(b"Domain Name: EXAMPLE.COM\r\n")
                .await
                .unwrap();
        });

        let answer = lookup("127.0.0.1", port, "example.com", Duration::from_secs(2))
            .await
            .unwrap();
        assert!(is_complete(&answer));
    }

    #[tokio::test]
    async fn test_lookup_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Accept and never answer
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let result = lookup("127.0.0.1", port, "example.com", Duration::from_millis(100)).await;
        assert!(matches!(result, Err(WhoisError::Timeout)));
        server.abort();
    }
}
